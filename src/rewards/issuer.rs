use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    models::{CouponStatus, CouponTemplate, IssuedCoupon, Review, coupon_validity},
    store::{CouponStore, StoreError},
};

use super::codes::{MAX_CODE_ATTEMPTS, generate_code};

#[derive(Debug, Error)]
pub enum IssueError {
    #[error("coupon template is inactive")]
    TemplateInactive,

    #[error("no free coupon code after {attempts} attempts")]
    CodeSpaceExhausted { attempts: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Turns an accepted review into a single-use coupon.
#[derive(Clone)]
pub struct CouponIssuer {
    coupons: Arc<dyn CouponStore>,
}

impl CouponIssuer {
    pub fn new(coupons: Arc<dyn CouponStore>) -> Self {
        Self { coupons }
    }

    /// Issue the coupon for `review` from `template`.
    ///
    /// Terms are copied, so later template edits never reach this coupon.
    /// A review that already has a coupon gets that coupon back.
    #[tracing::instrument(
        skip(self, template, review),
        fields(review_id = %review.id, business_id = %review.business_id)
    )]
    pub async fn issue(
        &self,
        template: &CouponTemplate,
        review: &Review,
        now: DateTime<Utc>,
    ) -> Result<IssuedCoupon, IssueError> {
        if !template.is_active {
            return Err(IssueError::TemplateInactive);
        }

        // storage keeps microseconds, keep the in-memory value identical
        let issued_at = now.trunc_subsecs(6);

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = generate_code();
            if self
                .coupons
                .active_code_exists(review.business_id, code.clone())
                .await?
            {
                debug!(attempt, "coupon code collision, regenerating");
                continue;
            }

            let candidate = IssuedCoupon {
                id: Uuid::new_v4(),
                code,
                user_id: review.user_id,
                business_id: review.business_id,
                review_id: review.id,
                template_id: Some(template.id),
                terms: template.terms.clone(),
                issued_at,
                valid_until: issued_at + coupon_validity(),
                status: CouponStatus::Active,
                redeemed_at: None,
                redeemed_by: None,
            };

            match self.coupons.insert_issued_coupon(candidate).await {
                Ok(coupon) => {
                    info!(coupon_id = %coupon.id, "coupon issued");
                    return Ok(coupon);
                }
                Err(StoreError::Conflict) => {
                    if let Some(existing) =
                        self.coupons.find_issued_coupon_by_review(review.id).await?
                    {
                        return Ok(existing);
                    }
                    debug!(attempt, "coupon code taken concurrently, regenerating");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(IssueError::CodeSpaceExhausted {
            attempts: MAX_CODE_ATTEMPTS,
        })
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::always;

    use crate::{
        rewards::terms::{Reward, RewardTerms},
        store::{MemoryStore, MockCouponStore},
    };

    use super::*;

    fn template(is_active: bool) -> CouponTemplate {
        CouponTemplate {
            id: Uuid::new_v4(),
            business_id: Uuid::new_v4(),
            terms: RewardTerms {
                reward: Reward::FreeDrink {
                    item: "Lemon tea".into(),
                },
                min_purchase_amount: None,
            },
            is_active,
            created_at: Utc::now(),
        }
    }

    fn review_for(template: &CouponTemplate) -> Review {
        Review {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            business_id: template.business_id,
            rating: 5,
            text: "Great place".into(),
            latitude: 26.1445,
            longitude: 91.7362,
            verified: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn issued_coupon_is_valid_for_two_hours() {
        let issuer = CouponIssuer::new(Arc::new(MemoryStore::new()));
        let template = template(true);
        let review = review_for(&template);

        let coupon = issuer.issue(&template, &review, Utc::now()).await.unwrap();

        assert_eq!(coupon.valid_until - coupon.issued_at, coupon_validity());
        assert_eq!(coupon.status, CouponStatus::Active);
        assert_eq!(coupon.terms, template.terms);
        assert_eq!(coupon.review_id, review.id);
    }

    #[tokio::test]
    async fn second_issue_for_a_review_returns_the_first_coupon() {
        let issuer = CouponIssuer::new(Arc::new(MemoryStore::new()));
        let template = template(true);
        let review = review_for(&template);

        let first = issuer.issue(&template, &review, Utc::now()).await.unwrap();
        let second = issuer.issue(&template, &review, Utc::now()).await.unwrap();

        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn inactive_template_issues_nothing() {
        let issuer = CouponIssuer::new(Arc::new(MemoryStore::new()));
        let template = template(false);
        let review = review_for(&template);

        let err = issuer.issue(&template, &review, Utc::now()).await.unwrap_err();
        assert!(matches!(err, IssueError::TemplateInactive));
    }

    #[tokio::test]
    async fn collisions_give_up_after_five_attempts() {
        let mut store = MockCouponStore::new();
        store
            .expect_active_code_exists()
            .with(always(), always())
            .times(MAX_CODE_ATTEMPTS)
            .returning(|_, _| Ok(true));
        store.expect_insert_issued_coupon().never();

        let issuer = CouponIssuer::new(Arc::new(store));
        let template = template(true);
        let review = review_for(&template);

        let err = issuer.issue(&template, &review, Utc::now()).await.unwrap_err();
        assert!(matches!(
            err,
            IssueError::CodeSpaceExhausted { attempts: 5 }
        ));
    }
}
