use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    models::{CouponKind, PromotionalCoupon, RedemptionOutcome, RejectionReason},
    store::{PromotionStore, RedemptionLog, StoreError, WritePolicy, with_retry},
};

use super::{
    codes::{generate_code, normalize_code},
    redemption::{RedemptionError, record_event},
    terms::{RewardTerms, TermsError},
};

const MAX_CODE_CHARS: usize = 32;
const MAX_TITLE_CHARS: usize = 120;

#[derive(Debug, Clone)]
pub struct NewPromotion {
    /// Left empty to get a generated code.
    pub code: Option<String>,
    pub title: String,
    pub terms: RewardTerms,
    pub usage_limit: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum PromotionError {
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    InvalidTerms(#[from] TermsError),

    #[error("coupon code already in use")]
    CodeTaken,

    #[error("promotional coupon not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PromotionalRedemption {
    pub coupon: PromotionalCoupon,
    pub redeemed_at: DateTime<Utc>,
}

/// Business-authored coupons that can be redeemed up to `usage_limit` times.
#[derive(Clone)]
pub struct PromotionalCouponEngine {
    promotions: Arc<dyn PromotionStore>,
    log: Arc<dyn RedemptionLog>,
    policy: WritePolicy,
}

impl PromotionalCouponEngine {
    pub fn new(
        promotions: Arc<dyn PromotionStore>,
        log: Arc<dyn RedemptionLog>,
        policy: WritePolicy,
    ) -> Self {
        Self {
            promotions,
            log,
            policy,
        }
    }

    #[tracing::instrument(skip(self, new), fields(title = %new.title))]
    pub async fn create(
        &self,
        business_id: Uuid,
        new: NewPromotion,
        now: DateTime<Utc>,
    ) -> Result<PromotionalCoupon, PromotionError> {
        new.terms.validate()?;

        let title = new.title.trim().to_string();
        if title.is_empty() || title.chars().count() > MAX_TITLE_CHARS {
            return Err(PromotionError::Invalid(format!(
                "title must be 1 to {MAX_TITLE_CHARS} characters"
            )));
        }
        if new.usage_limit.is_some_and(|limit| limit < 1) {
            return Err(PromotionError::Invalid(
                "usage limit must be at least 1".into(),
            ));
        }
        if new.expires_at.is_some_and(|expires_at| expires_at <= now) {
            return Err(PromotionError::Invalid(
                "expiry must be in the future".into(),
            ));
        }

        let code = match new.code.as_deref().map(normalize_code) {
            Some(code) if !code.is_empty() => code,
            _ => generate_code(),
        };
        if code.len() > MAX_CODE_CHARS
            || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(PromotionError::Invalid(
                "code may only contain letters, digits and '-'".into(),
            ));
        }

        let coupon = PromotionalCoupon {
            id: Uuid::new_v4(),
            business_id,
            code,
            title,
            terms: new.terms,
            usage_limit: new.usage_limit,
            usage_count: 0,
            is_active: true,
            expires_at: new.expires_at,
            created_at: now,
            updated_at: now,
        };

        match self.promotions.insert_promotional_coupon(coupon).await {
            Ok(coupon) => {
                info!(coupon_id = %coupon.id, "promotional coupon created");
                Ok(coupon)
            }
            Err(StoreError::Conflict) => Err(PromotionError::CodeTaken),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn list(&self, business_id: Uuid) -> Result<Vec<PromotionalCoupon>, PromotionError> {
        Ok(self.promotions.list_promotional_coupons(business_id).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_active(
        &self,
        business_id: Uuid,
        coupon_id: Uuid,
        is_active: bool,
        now: DateTime<Utc>,
    ) -> Result<PromotionalCoupon, PromotionError> {
        let owned = self
            .promotions
            .find_promotional_coupon(coupon_id)
            .await?
            .is_some_and(|coupon| coupon.business_id == business_id);
        if !owned {
            return Err(PromotionError::NotFound);
        }

        self.promotions
            .set_promotional_active(coupon_id, is_active, now)
            .await?
            .ok_or(PromotionError::NotFound)
    }

    #[tracing::instrument(skip(self))]
    pub async fn redeem(
        &self,
        coupon_id: Uuid,
        scanner_business_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<PromotionalRedemption, RedemptionError> {
        let (kind, result) = self.attempt(coupon_id, scanner_business_id, now).await;

        let outcome = match &result {
            Ok(_) => RedemptionOutcome::Success,
            Err(err) => err.outcome(),
        };
        record_event(
            self.log.as_ref(),
            coupon_id,
            kind,
            scanner_business_id,
            outcome,
            now,
        )
        .await;

        match &result {
            Ok(redemption) => info!(
                usage_count = redemption.coupon.usage_count,
                "promotional coupon redeemed"
            ),
            Err(err) => info!(outcome = outcome.as_str(), error = %err, "redemption refused"),
        }
        result
    }

    async fn attempt(
        &self,
        coupon_id: Uuid,
        scanner_business_id: Uuid,
        now: DateTime<Utc>,
    ) -> (Option<CouponKind>, Result<PromotionalRedemption, RedemptionError>) {
        let coupon = match self.load(coupon_id).await {
            Ok(Some(coupon)) => coupon,
            Ok(None) => return (None, Err(RejectionReason::NotFound.into())),
            Err(err) => return (None, Err(err)),
        };
        let kind = Some(CouponKind::Promotional);

        if let Err(reason) = check(&coupon, scanner_business_id, now) {
            return (kind, Err(reason.into()));
        }

        let written = with_retry(&self.policy, "increment_usage", || {
            self.promotions.increment_usage(coupon_id, now)
        })
        .await;

        let result = match written {
            Ok(Some(usage_count)) => Ok(PromotionalRedemption {
                coupon: PromotionalCoupon {
                    usage_count,
                    updated_at: now,
                    ..coupon
                },
                redeemed_at: now,
            }),
            Ok(None) => Err(self.classify_lost_write(coupon_id).await),
            Err(err) => Err(RedemptionError::from_store("increment_usage", err)),
        };
        (kind, result)
    }

    async fn load(&self, coupon_id: Uuid) -> Result<Option<PromotionalCoupon>, RedemptionError> {
        with_retry(&self.policy, "find_promotional_coupon", || {
            self.promotions.find_promotional_coupon(coupon_id)
        })
        .await
        .map_err(|err| RedemptionError::from_store("find_promotional_coupon", err))
    }

    /// The ceiling or the active flag stopped the increment after our read.
    async fn classify_lost_write(&self, coupon_id: Uuid) -> RedemptionError {
        match self.load(coupon_id).await {
            Ok(Some(coupon)) if !coupon.is_active => RejectionReason::Inactive.into(),
            Ok(Some(_)) => RejectionReason::UsageLimitReached.into(),
            Ok(None) => RejectionReason::NotFound.into(),
            Err(err) => err,
        }
    }
}

fn check(
    coupon: &PromotionalCoupon,
    scanner_business_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), RejectionReason> {
    if coupon.business_id != scanner_business_id {
        return Err(RejectionReason::WrongBusiness);
    }
    if !coupon.is_active {
        return Err(RejectionReason::Inactive);
    }
    if coupon.expires_at.is_some_and(|expires_at| now > expires_at) {
        return Err(RejectionReason::Expired);
    }
    if coupon.is_exhausted() {
        return Err(RejectionReason::UsageLimitReached);
    }
    Ok(())
}
