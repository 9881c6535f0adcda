use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::rewards::{geo::GeoPoint, terms::RewardTerms};

/// Lifetime of a review coupon, counted from issuance. Not configurable per business.
pub const COUPON_VALIDITY_SECS: i64 = 2 * 60 * 60;

pub fn coupon_validity() -> Duration {
    Duration::seconds(COUPON_VALIDITY_SECS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Business,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Business => "business",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "business" => Some(Role::Business),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Business {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub business_id: Uuid,
    pub rating: i16,
    pub text: String,
    pub latitude: f64,
    pub longitude: f64,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CouponTemplate {
    pub id: Uuid,
    pub business_id: Uuid,
    pub terms: RewardTerms,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Persisted state of a review coupon. Expiry is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CouponStatus {
    Active,
    Redeemed,
}

impl CouponStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponStatus::Active => "active",
            CouponStatus::Redeemed => "redeemed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(CouponStatus::Active),
            "redeemed" => Some(CouponStatus::Redeemed),
            _ => None,
        }
    }
}

/// Status as presented to clients, with expiry folded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CouponState {
    Active,
    Redeemed,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCoupon {
    pub id: Uuid,
    pub code: String,
    pub user_id: Uuid,
    pub business_id: Uuid,
    pub review_id: Uuid,
    pub template_id: Option<Uuid>,
    pub terms: RewardTerms,
    pub issued_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub status: CouponStatus,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub redeemed_by: Option<Uuid>,
}

impl IssuedCoupon {
    pub fn state_at(&self, now: DateTime<Utc>) -> CouponState {
        match self.status {
            CouponStatus::Redeemed => CouponState::Redeemed,
            CouponStatus::Active if now > self.valid_until => CouponState::Expired,
            CouponStatus::Active => CouponState::Active,
        }
    }

    /// Whole seconds left in the validity window, zero once it has passed.
    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.valid_until - now).num_seconds().max(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PromotionalCoupon {
    pub id: Uuid,
    pub business_id: Uuid,
    pub code: String,
    pub title: String,
    pub terms: RewardTerms,
    pub usage_limit: Option<i32>,
    pub usage_count: i32,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PromotionalCoupon {
    pub fn is_exhausted(&self) -> bool {
        self.usage_limit
            .is_some_and(|limit| self.usage_count >= limit)
    }

    pub fn remaining_uses(&self) -> Option<i32> {
        self.usage_limit
            .map(|limit| (limit - self.usage_count).max(0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CouponKind {
    Review,
    Promotional,
}

impl CouponKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponKind::Review => "review",
            CouponKind::Promotional => "promotional",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "review" => Some(CouponKind::Review),
            "promotional" => Some(CouponKind::Promotional),
            _ => None,
        }
    }
}

/// Why a redemption attempt was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    NotFound,
    WrongBusiness,
    AlreadyRedeemed,
    Expired,
    UsageLimitReached,
    Inactive,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::NotFound => "not_found",
            RejectionReason::WrongBusiness => "wrong_business",
            RejectionReason::AlreadyRedeemed => "already_redeemed",
            RejectionReason::Expired => "expired",
            RejectionReason::UsageLimitReached => "usage_limit_reached",
            RejectionReason::Inactive => "inactive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum RedemptionOutcome {
    Success,
    Rejected(RejectionReason),
    /// Storage could not confirm the write; the coupon must be re-queried.
    Unavailable,
}

impl RedemptionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedemptionOutcome::Success => "success",
            RedemptionOutcome::Rejected(reason) => reason.as_str(),
            RedemptionOutcome::Unavailable => "unavailable",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let outcome = match value {
            "success" => RedemptionOutcome::Success,
            "unavailable" => RedemptionOutcome::Unavailable,
            "not_found" => RedemptionOutcome::Rejected(RejectionReason::NotFound),
            "wrong_business" => RedemptionOutcome::Rejected(RejectionReason::WrongBusiness),
            "already_redeemed" => RedemptionOutcome::Rejected(RejectionReason::AlreadyRedeemed),
            "expired" => RedemptionOutcome::Rejected(RejectionReason::Expired),
            "usage_limit_reached" => {
                RedemptionOutcome::Rejected(RejectionReason::UsageLimitReached)
            }
            "inactive" => RedemptionOutcome::Rejected(RejectionReason::Inactive),
            _ => return None,
        };
        Some(outcome)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionEvent {
    pub id: Uuid,
    pub coupon_id: Uuid,
    pub coupon_kind: Option<CouponKind>,
    pub scanner_business_id: Uuid,
    pub outcome: RedemptionOutcome,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AuditEntry {
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource: Option<String>,
    pub metadata: Option<Value>,
}
