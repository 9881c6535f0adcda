use std::sync::Arc;

use chrono::Duration;

use crate::{
    config::{AppConfig, REVIEW_COOLDOWN_DAYS_RANGE},
    rewards::{
        CouponIssuer, CouponTemplates, PromotionalCouponEngine, RedemptionEngine, ReviewGate,
    },
    store::{AuditStore, BusinessStore, CouponStore, RedemptionLog, Store, UserStore},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub businesses: Arc<dyn BusinessStore>,
    pub coupons: Arc<dyn CouponStore>,
    pub redemption_log: Arc<dyn RedemptionLog>,
    pub audit: Arc<dyn AuditStore>,
    pub templates: CouponTemplates,
    pub review_gate: ReviewGate,
    pub redemptions: RedemptionEngine,
    pub promotions: PromotionalCouponEngine,
}

impl AppState {
    /// Wire every engine to one storage backend.
    pub fn from_store<S>(config: AppConfig, store: S) -> Self
    where
        S: Store + 'static,
    {
        let store = Arc::new(store);
        let policy = config.write_policy;

        let templates = CouponTemplates::new(store.clone());
        let issuer = CouponIssuer::new(store.clone());
        let review_gate = ReviewGate::new(
            store.clone(),
            store.clone(),
            store.clone(),
            templates.clone(),
            issuer,
            review_cooldown(config.review_cooldown_days),
        );

        Self {
            config: Arc::new(config),
            users: store.clone(),
            businesses: store.clone(),
            coupons: store.clone(),
            redemption_log: store.clone(),
            audit: store.clone(),
            templates,
            review_gate,
            redemptions: RedemptionEngine::new(store.clone(), store.clone(), policy),
            promotions: PromotionalCouponEngine::new(store.clone(), store, policy),
        }
    }
}

// `from_env` rejects out-of-range values; configs built in code are clamped
// so the duplicate-review rule can never be switched off.
fn review_cooldown(days: i64) -> Duration {
    let days = days.clamp(
        *REVIEW_COOLDOWN_DAYS_RANGE.start(),
        *REVIEW_COOLDOWN_DAYS_RANGE.end(),
    );
    Duration::days(days)
}
