//! Geofenced review-to-coupon pipeline.
//!
//! A review admitted by [`ReviewGate`] issues a two-hour coupon through
//! [`CouponIssuer`]; the coupon travels as a [`QrPayload`] and is consumed
//! exactly once by [`RedemptionEngine`]. Business-authored coupons with a
//! usage ceiling go through [`PromotionalCouponEngine`] instead.

pub mod codes;
pub mod gate;
pub mod geo;
pub mod issuer;
pub mod promotions;
pub mod qr;
pub mod redemption;
pub mod templates;
pub mod terms;

pub use gate::{ReviewAdmission, ReviewError, ReviewGate, ReviewSubmission};
pub use geo::{GeoPoint, is_within_radius};
pub use issuer::{CouponIssuer, IssueError};
pub use promotions::{NewPromotion, PromotionError, PromotionalCouponEngine, PromotionalRedemption};
pub use qr::{QrError, QrPayload};
pub use redemption::{Redemption, RedemptionEngine, RedemptionError};
pub use templates::{CouponTemplates, TemplateError};
pub use terms::{Reward, RewardTerms};
