use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    models::{COUPON_VALIDITY_SECS, CouponState, IssuedCoupon},
    rewards::terms::RewardTerms,
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRequest {
    #[serde(flatten)]
    pub terms: RewardTerms,
    pub is_active: Option<bool>,
}

/// An issued coupon as shown to clients, with expiry folded into `state`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CouponView {
    #[serde(flatten)]
    pub coupon: IssuedCoupon,
    pub state: CouponState,
    pub seconds_remaining: i64,
    pub validity_window_seconds: i64,
}

impl CouponView {
    pub fn at(coupon: IssuedCoupon, now: DateTime<Utc>) -> Self {
        Self {
            state: coupon.state_at(now),
            seconds_remaining: coupon.seconds_remaining(now),
            validity_window_seconds: COUPON_VALIDITY_SECS,
            coupon,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CouponList {
    pub items: Vec<CouponView>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CouponPolicy {
    pub validity_window_seconds: i64,
}
