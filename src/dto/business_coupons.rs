use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    models::{CouponKind, IssuedCoupon, PromotionalCoupon, RedemptionEvent},
    rewards::terms::RewardTerms,
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanRedeemRequest {
    pub qr_code_data: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum RedeemedCoupon {
    Review(IssuedCoupon),
    Promotional(PromotionalCoupon),
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanRedeemResponse {
    pub coupon_kind: CouponKind,
    pub coupon: RedeemedCoupon,
    pub redeemed_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePromotionRequest {
    pub code: Option<String>,
    pub title: String,
    #[serde(flatten)]
    pub terms: RewardTerms,
    pub usage_limit: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePromotionRequest {
    pub is_active: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PromotionList {
    pub items: Vec<PromotionView>,
}

/// A promotional coupon with its remaining uses; `null` means unlimited.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PromotionView {
    #[serde(flatten)]
    pub coupon: PromotionalCoupon,
    pub remaining_uses: Option<i32>,
}

impl From<PromotionalCoupon> for PromotionView {
    fn from(coupon: PromotionalCoupon) -> Self {
        Self {
            remaining_uses: coupon.remaining_uses(),
            coupon,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RedemptionEventList {
    pub items: Vec<RedemptionEvent>,
}
