//! Reward shapes shared by coupon templates, issued coupons and promotional coupons.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// What the customer receives. Each variant carries only the fields that make
/// sense for it, so a free item can never carry a percentage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "rewardType", rename_all = "snake_case")]
pub enum Reward {
    Percentage {
        percent: u8,
        #[serde(rename = "maxDiscountAmount")]
        max_discount_amount: Option<i64>,
    },
    Fixed {
        amount: i64,
    },
    FreeItem {
        item: String,
    },
    FreeDrink {
        item: String,
    },
    #[serde(rename = "buy1get1")]
    BuyOneGetOne {
        item: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RewardTerms {
    #[serde(flatten)]
    pub reward: Reward,
    pub min_purchase_amount: Option<i64>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TermsError {
    #[error("percentage must be between 1 and 100")]
    PercentOutOfRange,
    #[error("amounts must be greater than 0")]
    NonPositiveAmount,
    #[error("minimum purchase amount cannot be negative")]
    NegativeMinimum,
    #[error("item name is required")]
    MissingItem,
}

impl RewardTerms {
    pub fn validate(&self) -> Result<(), TermsError> {
        if self.min_purchase_amount.is_some_and(|min| min < 0) {
            return Err(TermsError::NegativeMinimum);
        }
        match &self.reward {
            Reward::Percentage {
                percent,
                max_discount_amount,
            } => {
                if !(1..=100).contains(percent) {
                    return Err(TermsError::PercentOutOfRange);
                }
                if max_discount_amount.is_some_and(|max| max <= 0) {
                    return Err(TermsError::NonPositiveAmount);
                }
            }
            Reward::Fixed { amount } => {
                if *amount <= 0 {
                    return Err(TermsError::NonPositiveAmount);
                }
            }
            Reward::FreeItem { item } | Reward::FreeDrink { item } | Reward::BuyOneGetOne { item } => {
                if item.trim().is_empty() {
                    return Err(TermsError::MissingItem);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn percentage(percent: u8, max: Option<i64>) -> RewardTerms {
        RewardTerms {
            reward: Reward::Percentage {
                percent,
                max_discount_amount: max,
            },
            min_purchase_amount: Some(10_000),
        }
    }

    #[test]
    fn wire_shape_is_flat_and_tagged() {
        let value = serde_json::to_value(percentage(15, Some(5_000))).unwrap();
        assert_eq!(
            value,
            json!({
                "rewardType": "percentage",
                "percent": 15,
                "maxDiscountAmount": 5_000,
                "minPurchaseAmount": 10_000
            })
        );

        let b1g1: RewardTerms = serde_json::from_value(json!({
            "rewardType": "buy1get1",
            "item": "Masala chai",
            "minPurchaseAmount": null
        }))
        .unwrap();
        assert_eq!(b1g1.reward.kind(), "buy1get1");
    }

    #[test]
    fn mixed_fields_do_not_parse_as_another_variant() {
        let parsed = serde_json::from_value::<RewardTerms>(json!({
            "rewardType": "free_item",
            "percent": 20
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        assert_eq!(percentage(0, None).validate(), Err(TermsError::PercentOutOfRange));
        assert_eq!(percentage(101, None).validate(), Err(TermsError::PercentOutOfRange));
        assert_eq!(percentage(10, Some(0)).validate(), Err(TermsError::NonPositiveAmount));

        let fixed = RewardTerms {
            reward: Reward::Fixed { amount: 0 },
            min_purchase_amount: None,
        };
        assert_eq!(fixed.validate(), Err(TermsError::NonPositiveAmount));

        let drink = RewardTerms {
            reward: Reward::FreeDrink { item: "  ".into() },
            min_purchase_amount: None,
        };
        assert_eq!(drink.validate(), Err(TermsError::MissingItem));

        let negative_min = RewardTerms {
            reward: Reward::Fixed { amount: 100 },
            min_purchase_amount: Some(-1),
        };
        assert_eq!(negative_min.validate(), Err(TermsError::NegativeMinimum));
    }
}
