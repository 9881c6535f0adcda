//! Persistence seam for the reward pipeline.
//!
//! Every mutation of a coupon record goes through one conditional write
//! (`mark_redeemed`, `increment_usage`) whose atomicity is provided by the
//! backing store, never by application-side read-then-write.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use sea_orm::{DbErr, RuntimeErr, SqlErr};
use sqlx::error::ErrorKind;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::models::{
    AuditEntry, Business, CouponTemplate, IssuedCoupon, PromotionalCoupon, RedemptionEvent,
    Review, User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,

    #[error("storage temporarily unavailable: {0}")]
    Transient(String),

    #[error("storage write timed out")]
    TimedOut,

    #[error("retry limit exceeded after {attempts} attempts")]
    RetryLimitExceeded { attempts: u8 },

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("database error")]
    Database(#[source] sqlx::Error),

    #[error("orm error")]
    Orm(#[source] DbErr),
}

impl StoreError {
    /// True only when the failed write is known not to have committed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Conflicts and errors known to have rolled back, or `None` for the rest.
fn classify_sqlx(error: &sqlx::Error) -> Option<StoreError> {
    if matches!(error, sqlx::Error::PoolTimedOut) {
        return Some(StoreError::Transient("connection pool timed out".into()));
    }
    let db_error = error.as_database_error()?;
    if matches!(db_error.kind(), ErrorKind::UniqueViolation) {
        return Some(StoreError::Conflict);
    }
    // serialization_failure / deadlock_detected roll the statement back
    if matches!(db_error.code().as_deref(), Some("40001") | Some("40P01")) {
        return Some(StoreError::Transient(db_error.message().to_string()));
    }
    None
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        classify_sqlx(&error).unwrap_or(StoreError::Database(error))
    }
}

impl From<DbErr> for StoreError {
    fn from(error: DbErr) -> Self {
        if matches!(error.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
            return StoreError::Conflict;
        }
        match &error {
            DbErr::ConnectionAcquire(err) => return StoreError::Transient(err.to_string()),
            DbErr::Conn(RuntimeErr::SqlxError(sqlx_error))
            | DbErr::Exec(RuntimeErr::SqlxError(sqlx_error))
            | DbErr::Query(RuntimeErr::SqlxError(sqlx_error)) => {
                if let Some(classified) = classify_sqlx(sqlx_error) {
                    return classified;
                }
            }
            _ => {}
        }
        StoreError::Orm(error)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        StoreError::Corrupt(error.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Timeout and retry budget for conditional writes on the redemption path.
#[derive(Debug, Clone, Copy)]
pub struct WritePolicy {
    pub timeout: Duration,
    pub max_attempts: u8,
    pub base_delay: Duration,
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            max_attempts: 3,
            base_delay: Duration::from_millis(25),
        }
    }
}

/// Run a conditional write under `policy`.
///
/// Only `Transient` errors are retried. A timeout is returned as `TimedOut`
/// immediately: the write may have committed, so the caller must re-read
/// rather than repeat it.
pub async fn with_retry<T, F, Fut>(
    policy: &WritePolicy,
    operation: &'static str,
    mut write: F,
) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u8 = 0;

    loop {
        attempt += 1;

        let result = match tokio::time::timeout(policy.timeout, write()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, attempt, "conditional write timed out");
                return Err(StoreError::TimedOut);
            }
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                warn!(operation, attempt, max_attempts, error = %err, "transient store error, retrying");

                tokio::time::sleep(backoff_delay(policy.base_delay, attempt)).await;
            }
            Err(err) if err.is_retryable() => {
                warn!(operation, attempts = attempt, error = %err, "retry budget exhausted");
                return Err(StoreError::RetryLimitExceeded { attempts: attempt });
            }
            Err(err) => return Err(err),
        }
    }
}

const MAX_BACKOFF_MS: u64 = 1_000;

/// Exponential backoff capped at one second, plus up to `base` of jitter.
fn backoff_delay(base: Duration, attempt: u8) -> Duration {
    let base_ms = u64::try_from(base.as_millis()).unwrap_or(MAX_BACKOFF_MS);
    let factor = 2_u64
        .checked_pow(u32::from(attempt.saturating_sub(1)))
        .unwrap_or(u64::MAX);
    let backoff = base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS);
    let jitter = rand::random::<u64>() % (base_ms.min(MAX_BACKOFF_MS) + 1);
    Duration::from_millis(backoff + jitter)
}

#[automock]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: User) -> StoreResult<User>;

    async fn find_user_by_email(&self, email: String) -> StoreResult<Option<User>>;
}

#[automock]
#[async_trait]
pub trait BusinessStore: Send + Sync {
    /// `Conflict` when the owner already has a business.
    async fn insert_business(&self, business: Business) -> StoreResult<Business>;

    async fn find_business(&self, id: Uuid) -> StoreResult<Option<Business>>;

    async fn find_business_by_owner(&self, owner_id: Uuid) -> StoreResult<Option<Business>>;
}

#[automock]
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Insert `review` unless the same user already reviewed the same business
    /// at or after `since`. Check and insert are one atomic step per
    /// (user, business). Returns false when a recent review exists.
    async fn insert_review_unless_recent(
        &self,
        review: Review,
        since: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn find_review(&self, id: Uuid) -> StoreResult<Option<Review>>;
}

#[automock]
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn current_template(&self, business_id: Uuid) -> StoreResult<Option<CouponTemplate>>;

    /// Make `template` the current one for its business, superseding the previous.
    async fn replace_template(&self, template: CouponTemplate) -> StoreResult<CouponTemplate>;
}

#[automock]
#[async_trait]
pub trait CouponStore: Send + Sync {
    /// `Conflict` on a duplicate active code for the business or a second
    /// coupon for the same review.
    async fn insert_issued_coupon(&self, coupon: IssuedCoupon) -> StoreResult<IssuedCoupon>;

    async fn find_issued_coupon(&self, id: Uuid) -> StoreResult<Option<IssuedCoupon>>;

    async fn find_issued_coupon_by_review(
        &self,
        review_id: Uuid,
    ) -> StoreResult<Option<IssuedCoupon>>;

    async fn list_issued_coupons(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<IssuedCoupon>, i64)>;

    async fn active_code_exists(&self, business_id: Uuid, code: String) -> StoreResult<bool>;

    /// `active -> redeemed`, guarded by `status = 'active'`. Returns false when
    /// the guard did not hold.
    async fn mark_redeemed(
        &self,
        id: Uuid,
        redeemed_at: DateTime<Utc>,
        redeemed_by: Uuid,
    ) -> StoreResult<bool>;
}

#[automock]
#[async_trait]
pub trait PromotionStore: Send + Sync {
    /// `Conflict` when the business already uses the code.
    async fn insert_promotional_coupon(
        &self,
        coupon: PromotionalCoupon,
    ) -> StoreResult<PromotionalCoupon>;

    async fn find_promotional_coupon(&self, id: Uuid) -> StoreResult<Option<PromotionalCoupon>>;

    async fn list_promotional_coupons(&self, business_id: Uuid)
    -> StoreResult<Vec<PromotionalCoupon>>;

    async fn set_promotional_active(
        &self,
        id: Uuid,
        is_active: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<PromotionalCoupon>>;

    /// Increment `usage_count` if the coupon is active and below its limit.
    /// Returns the new count, or `None` when the ceiling or the active flag
    /// stopped the write.
    async fn increment_usage(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<i32>>;
}

#[automock]
#[async_trait]
pub trait RedemptionLog: Send + Sync {
    async fn append_redemption_event(&self, event: RedemptionEvent) -> StoreResult<()>;

    /// Newest first, one page at a time, with the total matching count.
    async fn list_redemption_events(
        &self,
        scanner_business_id: Uuid,
        coupon_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<RedemptionEvent>, i64)>;
}

#[automock]
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append_audit(&self, entry: AuditEntry) -> StoreResult<()>;
}

/// Everything the service needs from one backend.
pub trait Store:
    UserStore
    + BusinessStore
    + ReviewStore
    + TemplateStore
    + CouponStore
    + PromotionStore
    + RedemptionLog
    + AuditStore
{
}

impl<T> Store for T where
    T: UserStore
        + BusinessStore
        + ReviewStore
        + TemplateStore
        + CouponStore
        + PromotionStore
        + RedemptionLog
        + AuditStore
{
}
