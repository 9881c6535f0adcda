mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{SHOP, create_business, create_template, create_user, memory_state, ten_percent};
use review_rewards_api::{
    dto::business_coupons::ScanRedeemRequest,
    error::AppError,
    middleware::auth::AuthUser,
    models::{
        CouponKind, CouponStatus, IssuedCoupon, PromotionalCoupon, RedemptionOutcome,
        RejectionReason, Role,
    },
    rewards::{NewPromotion, QrPayload, RedemptionError, ReviewSubmission},
    routes::params::EventQuery,
    services::redemption_service,
    state::AppState,
    store::{
        BusinessStore, CouponStore, MemoryStore, MockCouponStore, PromotionStore, StoreError,
    },
};
use mockall::Sequence;
use tokio::task::JoinSet;

async fn issued_coupon(store: &MemoryStore, state: &AppState) -> IssuedCoupon {
    let (_, business) = create_business(store).await;
    create_template(store, business.id, ten_percent()).await;
    let user = create_user(store, Role::User).await;

    state
        .review_gate
        .submit(
            ReviewSubmission {
                user_id: user.id,
                business_id: business.id,
                rating: 4,
                text: "Quick service".into(),
                location: SHOP,
            },
            Utc::now(),
        )
        .await
        .unwrap()
        .coupon
        .expect("coupon issued")
}

async fn promotion(state: &AppState, store: &MemoryStore, usage_limit: i32) -> PromotionalCoupon {
    let (_, business) = create_business(store).await;
    state
        .promotions
        .create(
            business.id,
            NewPromotion {
                code: Some("monsoon-sale".into()),
                title: "Monsoon sale".into(),
                terms: ten_percent(),
                usage_limit: Some(usage_limit),
                expires_at: None,
            },
            Utc::now(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn coupon_redeems_once_at_its_own_business() {
    let store = MemoryStore::new();
    let state = memory_state(&store);
    let coupon = issued_coupon(&store, &state).await;
    let (_, other_business) = create_business(&store).await;

    let err = state
        .redemptions
        .redeem(coupon.id, other_business.id, Utc::now())
        .await
        .unwrap_err();
    assert_eq!(err, RedemptionError::Rejected(RejectionReason::WrongBusiness));

    let redemption = state
        .redemptions
        .redeem(coupon.id, coupon.business_id, Utc::now())
        .await
        .unwrap();
    assert_eq!(redemption.coupon.status, CouponStatus::Redeemed);
    assert_eq!(redemption.coupon.redeemed_by, Some(coupon.business_id));

    let err = state
        .redemptions
        .redeem(coupon.id, coupon.business_id, Utc::now())
        .await
        .unwrap_err();
    assert_eq!(err, RedemptionError::Rejected(RejectionReason::AlreadyRedeemed));

    let outcomes: Vec<RedemptionOutcome> = store
        .redemption_events()
        .unwrap()
        .into_iter()
        .filter(|event| event.coupon_id == coupon.id)
        .map(|event| event.outcome)
        .collect();
    assert_eq!(
        outcomes,
        vec![
            RedemptionOutcome::Rejected(RejectionReason::WrongBusiness),
            RedemptionOutcome::Success,
            RedemptionOutcome::Rejected(RejectionReason::AlreadyRedeemed),
        ]
    );
}

#[tokio::test]
async fn coupon_past_its_window_is_expired() {
    let store = MemoryStore::new();
    let state = memory_state(&store);
    let coupon = issued_coupon(&store, &state).await;

    let late = coupon.valid_until + Duration::seconds(1);
    let err = state
        .redemptions
        .redeem(coupon.id, coupon.business_id, late)
        .await
        .unwrap_err();
    assert_eq!(err, RedemptionError::Rejected(RejectionReason::Expired));

    let stored = store.find_issued_coupon(coupon.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CouponStatus::Active);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_scans_redeem_exactly_once() {
    let store = MemoryStore::new();
    let state = memory_state(&store);
    let coupon = issued_coupon(&store, &state).await;

    let mut tasks = JoinSet::new();
    for _ in 0..16 {
        let engine = state.redemptions.clone();
        let (coupon_id, business_id) = (coupon.id, coupon.business_id);
        tasks.spawn(async move { engine.redeem(coupon_id, business_id, Utc::now()).await });
    }

    let mut successes = 0;
    let mut already_redeemed = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.unwrap() {
            Ok(_) => successes += 1,
            Err(RedemptionError::Rejected(RejectionReason::AlreadyRedeemed)) => {
                already_redeemed += 1
            }
            Err(other) => panic!("unexpected outcome: {other}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(already_redeemed, 15);

    let events = store.redemption_events().unwrap();
    let recorded_successes = events
        .iter()
        .filter(|event| event.outcome == RedemptionOutcome::Success)
        .count();
    assert_eq!(recorded_successes, 1);
    assert!(
        events
            .iter()
            .all(|event| event.coupon_kind == Some(CouponKind::Review))
    );
}

#[tokio::test]
async fn promotion_stops_at_its_usage_limit() {
    let store = MemoryStore::new();
    let state = memory_state(&store);
    let promo = promotion(&state, &store, 3).await;
    assert_eq!(promo.code, "MONSOON-SALE");

    for expected in 1..=3 {
        let redemption = state
            .promotions
            .redeem(promo.id, promo.business_id, Utc::now())
            .await
            .unwrap();
        assert_eq!(redemption.coupon.usage_count, expected);
    }

    let err = state
        .promotions
        .redeem(promo.id, promo.business_id, Utc::now())
        .await
        .unwrap_err();
    assert_eq!(err, RedemptionError::Rejected(RejectionReason::UsageLimitReached));

    let stored = store.find_promotional_coupon(promo.id).await.unwrap().unwrap();
    assert_eq!(stored.usage_count, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_promotional_use_goes_to_one_scanner() {
    for contenders in [4, 7, 10] {
        let store = MemoryStore::new();
        let state = memory_state(&store);
        let promo = promotion(&state, &store, 3).await;
        for _ in 0..2 {
            state
                .promotions
                .redeem(promo.id, promo.business_id, Utc::now())
                .await
                .unwrap();
        }

        let mut tasks = JoinSet::new();
        for _ in 0..contenders {
            let engine = state.promotions.clone();
            let (id, business_id) = (promo.id, promo.business_id);
            tasks.spawn(async move { engine.redeem(id, business_id, Utc::now()).await });
        }

        let mut successes = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined.unwrap() {
                Ok(_) => successes += 1,
                Err(err) => assert_eq!(
                    err,
                    RedemptionError::Rejected(RejectionReason::UsageLimitReached)
                ),
            }
        }
        assert_eq!(successes, 1, "{contenders} contenders");

        let stored = store.find_promotional_coupon(promo.id).await.unwrap().unwrap();
        assert_eq!(stored.usage_count, 3);
    }
}

#[tokio::test]
async fn deactivated_promotion_is_refused() {
    let store = MemoryStore::new();
    let state = memory_state(&store);
    let promo = promotion(&state, &store, 5).await;

    state
        .promotions
        .set_active(promo.business_id, promo.id, false, Utc::now())
        .await
        .unwrap();

    let err = state
        .promotions
        .redeem(promo.id, promo.business_id, Utc::now())
        .await
        .unwrap_err();
    assert_eq!(err, RedemptionError::Rejected(RejectionReason::Inactive));
}

async fn owner_of(store: &MemoryStore, coupon: &IssuedCoupon) -> AuthUser {
    let business = store
        .find_business(coupon.business_id)
        .await
        .unwrap()
        .expect("business");
    AuthUser {
        user_id: business.owner_id,
        role: Role::Business,
    }
}

fn scan_of(coupon: &IssuedCoupon) -> ScanRedeemRequest {
    ScanRedeemRequest {
        qr_code_data: QrPayload::coupon(coupon.id).encode().unwrap(),
    }
}

#[tokio::test]
async fn scan_lookup_retries_a_transient_failure() {
    let store = MemoryStore::new();
    let state = memory_state(&store);
    let coupon = issued_coupon(&store, &state).await;
    let owner = owner_of(&store, &coupon).await;

    let mut flaky = MockCouponStore::new();
    let mut seq = Sequence::new();
    flaky
        .expect_find_issued_coupon()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Err(StoreError::Transient("pool timed out".into())));
    let found = coupon.clone();
    flaky
        .expect_find_issued_coupon()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_| Ok(Some(found.clone())));
    let state = AppState {
        coupons: Arc::new(flaky),
        ..state
    };

    let redeemed = redemption_service::scan_redeem(&state, &owner, scan_of(&coupon))
        .await
        .unwrap()
        .data
        .expect("redemption");
    assert_eq!(redeemed.coupon_kind, CouponKind::Review);
}

#[tokio::test]
async fn scan_lookup_outage_is_unavailable() {
    let store = MemoryStore::new();
    let state = memory_state(&store);
    let coupon = issued_coupon(&store, &state).await;
    let owner = owner_of(&store, &coupon).await;

    let mut down = MockCouponStore::new();
    down.expect_find_issued_coupon()
        .returning(|_| Err(StoreError::Transient("pool timed out".into())));
    let state = AppState {
        coupons: Arc::new(down),
        ..state
    };

    let err = redemption_service::scan_redeem(&state, &owner, scan_of(&coupon))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RedemptionUnavailable));

    let stored = store.find_issued_coupon(coupon.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CouponStatus::Active);
}

#[tokio::test]
async fn redemption_events_are_paginated_with_a_true_total() {
    let store = MemoryStore::new();
    let state = memory_state(&store);
    let coupon = issued_coupon(&store, &state).await;
    let owner = owner_of(&store, &coupon).await;

    for _ in 0..3 {
        let _ = state
            .redemptions
            .redeem(coupon.id, coupon.business_id, Utc::now())
            .await;
    }

    let query = |page| EventQuery {
        coupon_id: Some(coupon.id),
        page: Some(page),
        per_page: Some(2),
    };
    let first = redemption_service::list_events(&state, &owner, query(1))
        .await
        .unwrap();
    assert_eq!(first.data.expect("events").items.len(), 2);
    let meta = first.meta.expect("meta");
    assert_eq!(meta.total, Some(3));
    assert_eq!(meta.total_pages, Some(2));

    let second = redemption_service::list_events(&state, &owner, query(2))
        .await
        .unwrap();
    let items = second.data.expect("events").items;
    assert_eq!(items.len(), 1);
    // newest first, so the last page holds the original success
    assert_eq!(items[0].outcome, RedemptionOutcome::Success);
}
