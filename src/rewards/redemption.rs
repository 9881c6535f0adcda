//! Exactly-once redemption of review coupons.
//!
//! Preconditions are checked against a fresh read, then the transition
//! `active -> redeemed` is applied as one conditional write. Of any number of
//! concurrent scans of the same coupon exactly one wins the write; the others
//! observe the redeemed row and are told `AlreadyRedeemed`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    models::{
        CouponKind, CouponStatus, IssuedCoupon, RedemptionEvent, RedemptionOutcome,
        RejectionReason,
    },
    store::{CouponStore, RedemptionLog, StoreError, WritePolicy, with_retry},
};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Redemption {
    pub coupon: IssuedCoupon,
    pub redeemed_at: DateTime<Utc>,
}

/// Failure of a redemption attempt, shared by review and promotional coupons.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RedemptionError {
    #[error("redemption rejected: {}", .0.as_str())]
    Rejected(RejectionReason),

    /// Storage could not confirm the outcome. The coupon may or may not have
    /// been redeemed; its status must be re-queried.
    #[error("redemption temporarily unavailable")]
    Unavailable,
}

impl RedemptionError {
    pub fn outcome(&self) -> RedemptionOutcome {
        match self {
            RedemptionError::Rejected(reason) => RedemptionOutcome::Rejected(*reason),
            RedemptionError::Unavailable => RedemptionOutcome::Unavailable,
        }
    }

    pub(crate) fn from_store(operation: &'static str, err: StoreError) -> Self {
        match &err {
            StoreError::TimedOut | StoreError::RetryLimitExceeded { .. } => {
                warn!(operation, error = %err, "redemption write unconfirmed");
            }
            other => error!(operation, error = ?other, "redemption store failure"),
        }
        RedemptionError::Unavailable
    }
}

impl From<RejectionReason> for RedemptionError {
    fn from(reason: RejectionReason) -> Self {
        RedemptionError::Rejected(reason)
    }
}

/// Append a redemption event. Losing an event never changes the outcome.
pub(crate) async fn record_event(
    log: &dyn RedemptionLog,
    coupon_id: Uuid,
    coupon_kind: Option<CouponKind>,
    scanner_business_id: Uuid,
    outcome: RedemptionOutcome,
    now: DateTime<Utc>,
) {
    let event = RedemptionEvent {
        id: Uuid::new_v4(),
        coupon_id,
        coupon_kind,
        scanner_business_id,
        outcome,
        created_at: now,
    };
    if let Err(err) = log.append_redemption_event(event).await {
        warn!(%coupon_id, outcome = outcome.as_str(), error = %err, "redemption event not recorded");
    }
}

#[derive(Clone)]
pub struct RedemptionEngine {
    coupons: Arc<dyn CouponStore>,
    log: Arc<dyn RedemptionLog>,
    policy: WritePolicy,
}

impl RedemptionEngine {
    pub fn new(
        coupons: Arc<dyn CouponStore>,
        log: Arc<dyn RedemptionLog>,
        policy: WritePolicy,
    ) -> Self {
        Self {
            coupons,
            log,
            policy,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn redeem(
        &self,
        coupon_id: Uuid,
        scanner_business_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Redemption, RedemptionError> {
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
            Ok(_) => info!("coupon redeemed"),
            Err(err) => info!(outcome = outcome.as_str(), error = %err, "redemption refused"),
        }
        result
    }

    async fn attempt(
        &self,
        coupon_id: Uuid,
        scanner_business_id: Uuid,
        now: DateTime<Utc>,
    ) -> (Option<CouponKind>, Result<Redemption, RedemptionError>) {
        let coupon = match self.load(coupon_id).await {
            Ok(Some(coupon)) => coupon,
            Ok(None) => return (None, Err(RejectionReason::NotFound.into())),
            Err(err) => return (None, Err(err)),
        };
        let kind = Some(CouponKind::Review);

        if let Err(reason) = check(&coupon, scanner_business_id, now) {
            return (kind, Err(reason.into()));
        }

        let written = with_retry(&self.policy, "mark_redeemed", || {
            self.coupons
                .mark_redeemed(coupon_id, now, scanner_business_id)
        })
        .await;

        let result = match written {
            Ok(true) => Ok(Redemption {
                coupon: IssuedCoupon {
                    status: CouponStatus::Redeemed,
                    redeemed_at: Some(now),
                    redeemed_by: Some(scanner_business_id),
                    ..coupon
                },
                redeemed_at: now,
            }),
            Ok(false) => Err(self.classify_lost_write(coupon_id).await),
            Err(err) => Err(RedemptionError::from_store("mark_redeemed", err)),
        };
        (kind, result)
    }

    async fn load(&self, coupon_id: Uuid) -> Result<Option<IssuedCoupon>, RedemptionError> {
        with_retry(&self.policy, "find_issued_coupon", || {
            self.coupons.find_issued_coupon(coupon_id)
        })
        .await
        .map_err(|err| RedemptionError::from_store("find_issued_coupon", err))
    }

    /// The guarded write matched nothing, so another scan got there first.
    async fn classify_lost_write(&self, coupon_id: Uuid) -> RedemptionError {
        match self.load(coupon_id).await {
            Ok(Some(coupon)) if coupon.status == CouponStatus::Redeemed => {
                RejectionReason::AlreadyRedeemed.into()
            }
            Ok(Some(_)) => {
                error!(%coupon_id, "guarded write missed an active coupon");
                RedemptionError::Unavailable
            }
            Ok(None) => RejectionReason::NotFound.into(),
            Err(err) => err,
        }
    }
}

/// Preconditions in their fixed order. Expiry is derived from `now`, so a
/// coupon is never reported expired once it has been redeemed.
fn check(
    coupon: &IssuedCoupon,
    scanner_business_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), RejectionReason> {
    if coupon.business_id != scanner_business_id {
        return Err(RejectionReason::WrongBusiness);
    }
    if coupon.status == CouponStatus::Redeemed {
        return Err(RejectionReason::AlreadyRedeemed);
    }
    if now > coupon.valid_until {
        return Err(RejectionReason::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::Duration;

    use crate::{
        models::coupon_validity,
        rewards::terms::{Reward, RewardTerms},
        store::{MemoryStore, MockCouponStore, MockRedemptionLog},
    };

    use super::*;

    fn coupon(business_id: Uuid, issued_at: DateTime<Utc>) -> IssuedCoupon {
        IssuedCoupon {
            id: Uuid::new_v4(),
            code: "WXYZ-2345".into(),
            user_id: Uuid::new_v4(),
            business_id,
            review_id: Uuid::new_v4(),
            template_id: None,
            terms: RewardTerms {
                reward: Reward::Percentage {
                    percent: 10,
                    max_discount_amount: None,
                },
                min_purchase_amount: None,
            },
            issued_at,
            valid_until: issued_at + coupon_validity(),
            status: CouponStatus::Active,
            redeemed_at: None,
            redeemed_by: None,
        }
    }

    fn fast_policy() -> WritePolicy {
        WritePolicy {
            timeout: StdDuration::from_millis(200),
            max_attempts: 3,
            base_delay: StdDuration::from_millis(1),
        }
    }

    fn quiet_log() -> MockRedemptionLog {
        let mut log = MockRedemptionLog::new();
        log.expect_append_redemption_event().returning(|_| Ok(()));
        log
    }

    #[test]
    fn preconditions_are_checked_in_order() {
        let business_id = Uuid::new_v4();
        let issued_at = Utc::now();
        let mut redeemed = coupon(business_id, issued_at);
        redeemed.status = CouponStatus::Redeemed;

        // wrong business wins over everything else
        assert_eq!(
            check(&redeemed, Uuid::new_v4(), issued_at + Duration::hours(3)),
            Err(RejectionReason::WrongBusiness)
        );
        // redeemed and past validity is reported as redeemed
        assert_eq!(
            check(&redeemed, business_id, issued_at + Duration::hours(3)),
            Err(RejectionReason::AlreadyRedeemed)
        );
        let active = coupon(business_id, issued_at);
        assert_eq!(
            check(&active, business_id, active.valid_until + Duration::seconds(1)),
            Err(RejectionReason::Expired)
        );
        assert_eq!(check(&active, business_id, active.valid_until), Ok(()));
    }

    #[tokio::test]
    async fn event_is_recorded_for_every_outcome() {
        let store = MemoryStore::new();
        let business_id = Uuid::new_v4();
        let issued = coupon(business_id, Utc::now());
        store.insert_issued_coupon(issued.clone()).await.unwrap();

        let engine = RedemptionEngine::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            fast_policy(),
        );
        engine.redeem(issued.id, business_id, Utc::now()).await.unwrap();
        let _ = engine.redeem(issued.id, business_id, Utc::now()).await;
        let _ = engine.redeem(Uuid::new_v4(), business_id, Utc::now()).await;

        let events = store.redemption_events().unwrap();
        let outcomes: Vec<_> = events.iter().map(|e| e.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                RedemptionOutcome::Success,
                RedemptionOutcome::Rejected(RejectionReason::AlreadyRedeemed),
                RedemptionOutcome::Rejected(RejectionReason::NotFound),
            ]
        );
        assert_eq!(events[0].coupon_kind, Some(CouponKind::Review));
        assert_eq!(events[2].coupon_kind, None);
    }

    #[tokio::test]
    async fn transient_write_failures_are_retried() {
        let business_id = Uuid::new_v4();
        let issued = coupon(business_id, Utc::now());
        let stored = issued.clone();

        let mut coupons = MockCouponStore::new();
        coupons
            .expect_find_issued_coupon()
            .returning(move |_| Ok(Some(stored.clone())));
        let mut seq = mockall::Sequence::new();
        coupons
            .expect_mark_redeemed()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(StoreError::Transient("serialization failure".into())));
        coupons
            .expect_mark_redeemed()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(true));

        let engine = RedemptionEngine::new(Arc::new(coupons), Arc::new(quiet_log()), fast_policy());
        let redemption = engine
            .redeem(issued.id, business_id, Utc::now())
            .await
            .unwrap();

        assert_eq!(redemption.coupon.status, CouponStatus::Redeemed);
        assert_eq!(redemption.coupon.redeemed_by, Some(business_id));
    }

    #[tokio::test]
    async fn exhausted_retries_are_unavailable_not_success() {
        let business_id = Uuid::new_v4();
        let issued = coupon(business_id, Utc::now());
        let stored = issued.clone();

        let mut coupons = MockCouponStore::new();
        coupons
            .expect_find_issued_coupon()
            .returning(move |_| Ok(Some(stored.clone())));
        coupons
            .expect_mark_redeemed()
            .times(3)
            .returning(|_, _, _| Err(StoreError::Transient("pool timed out".into())));

        let mut log = MockRedemptionLog::new();
        log.expect_append_redemption_event()
            .withf(|event| event.outcome == RedemptionOutcome::Unavailable)
            .times(1)
            .returning(|_| Ok(()));

        let engine = RedemptionEngine::new(Arc::new(coupons), Arc::new(log), fast_policy());
        let err = engine
            .redeem(issued.id, business_id, Utc::now())
            .await
            .unwrap_err();

        assert_eq!(err, RedemptionError::Unavailable);
    }

    #[tokio::test]
    async fn lost_conditional_write_reports_already_redeemed() {
        let business_id = Uuid::new_v4();
        let issued = coupon(business_id, Utc::now());
        let before = issued.clone();
        let after = IssuedCoupon {
            status: CouponStatus::Redeemed,
            redeemed_at: Some(Utc::now()),
            redeemed_by: Some(business_id),
            ..issued.clone()
        };

        let mut coupons = MockCouponStore::new();
        let mut seq = mockall::Sequence::new();
        coupons
            .expect_find_issued_coupon()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(Some(before.clone())));
        coupons
            .expect_mark_redeemed()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(false));
        coupons
            .expect_find_issued_coupon()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(Some(after.clone())));

        let engine = RedemptionEngine::new(Arc::new(coupons), Arc::new(quiet_log()), fast_policy());
        let err = engine
            .redeem(issued.id, business_id, Utc::now())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            RedemptionError::Rejected(RejectionReason::AlreadyRedeemed)
        );
    }

    #[tokio::test]
    async fn failing_event_log_does_not_change_the_outcome() {
        let store = MemoryStore::new();
        let business_id = Uuid::new_v4();
        let issued = coupon(business_id, Utc::now());
        store.insert_issued_coupon(issued.clone()).await.unwrap();

        let mut log = MockRedemptionLog::new();
        log.expect_append_redemption_event()
            .returning(|_| Err(StoreError::Transient("disk full".into())));

        let engine = RedemptionEngine::new(Arc::new(store), Arc::new(log), fast_policy());
        assert!(engine.redeem(issued.id, business_id, Utc::now()).await.is_ok());
    }
}
