//! Single-process store for tests and local development.
//!
//! Each operation holds the table lock for its whole check-and-write, which
//! gives the conditional writes the same all-or-nothing behaviour the
//! Postgres store gets from a guarded `UPDATE`. It does not coordinate across
//! processes, so it must not back a multi-replica deployment.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    AuditEntry, Business, CouponStatus, CouponTemplate, IssuedCoupon, PromotionalCoupon,
    RedemptionEvent, Review, User,
};

use super::{
    AuditStore, BusinessStore, CouponStore, PromotionStore, RedemptionLog, ReviewStore,
    StoreError, StoreResult, TemplateStore, UserStore,
};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    businesses: HashMap<Uuid, Business>,
    reviews: HashMap<Uuid, Review>,
    // every template ever written, current ones flagged by `current_templates`
    templates: Vec<CouponTemplate>,
    current_templates: HashMap<Uuid, Uuid>,
    issued: HashMap<Uuid, IssuedCoupon>,
    promotions: HashMap<Uuid, PromotionalCoupon>,
    events: Vec<RedemptionEvent>,
    audit: Vec<AuditEntry>,
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Corrupt("memory store lock poisoned".into()))
    }

    /// Every redemption event recorded so far, oldest first.
    pub fn redemption_events(&self) -> StoreResult<Vec<RedemptionEvent>> {
        Ok(self.lock()?.events.clone())
    }

    pub fn audit_entries(&self) -> StoreResult<Vec<AuditEntry>> {
        Ok(self.lock()?.audit.clone())
    }

    /// All template versions of a business, oldest first.
    pub fn template_history(&self, business_id: Uuid) -> StoreResult<Vec<CouponTemplate>> {
        Ok(self
            .lock()?
            .templates
            .iter()
            .filter(|t| t.business_id == business_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: User) -> StoreResult<User> {
        let mut tables = self.lock()?;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict);
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: String) -> StoreResult<Option<User>> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }
}

#[async_trait]
impl BusinessStore for MemoryStore {
    async fn insert_business(&self, business: Business) -> StoreResult<Business> {
        let mut tables = self.lock()?;
        if tables
            .businesses
            .values()
            .any(|b| b.owner_id == business.owner_id)
        {
            return Err(StoreError::Conflict);
        }
        tables.businesses.insert(business.id, business.clone());
        Ok(business)
    }

    async fn find_business(&self, id: Uuid) -> StoreResult<Option<Business>> {
        Ok(self.lock()?.businesses.get(&id).cloned())
    }

    async fn find_business_by_owner(&self, owner_id: Uuid) -> StoreResult<Option<Business>> {
        Ok(self
            .lock()?
            .businesses
            .values()
            .find(|b| b.owner_id == owner_id)
            .cloned())
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn insert_review_unless_recent(
        &self,
        review: Review,
        since: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut tables = self.lock()?;
        let recent = tables.reviews.values().any(|r| {
            r.user_id == review.user_id
                && r.business_id == review.business_id
                && r.created_at >= since
        });
        if recent {
            return Ok(false);
        }
        tables.reviews.insert(review.id, review);
        Ok(true)
    }

    async fn find_review(&self, id: Uuid) -> StoreResult<Option<Review>> {
        Ok(self.lock()?.reviews.get(&id).cloned())
    }
}

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn current_template(&self, business_id: Uuid) -> StoreResult<Option<CouponTemplate>> {
        let tables = self.lock()?;
        let Some(current_id) = tables.current_templates.get(&business_id) else {
            return Ok(None);
        };
        Ok(tables.templates.iter().find(|t| t.id == *current_id).cloned())
    }

    async fn replace_template(&self, template: CouponTemplate) -> StoreResult<CouponTemplate> {
        let mut tables = self.lock()?;
        tables
            .current_templates
            .insert(template.business_id, template.id);
        tables.templates.push(template.clone());
        Ok(template)
    }
}

#[async_trait]
impl CouponStore for MemoryStore {
    async fn insert_issued_coupon(&self, coupon: IssuedCoupon) -> StoreResult<IssuedCoupon> {
        let mut tables = self.lock()?;
        let clash = tables.issued.values().any(|c| {
            c.review_id == coupon.review_id
                || (c.business_id == coupon.business_id
                    && c.code == coupon.code
                    && c.status == CouponStatus::Active)
        });
        if clash {
            return Err(StoreError::Conflict);
        }
        tables.issued.insert(coupon.id, coupon.clone());
        Ok(coupon)
    }

    async fn find_issued_coupon(&self, id: Uuid) -> StoreResult<Option<IssuedCoupon>> {
        Ok(self.lock()?.issued.get(&id).cloned())
    }

    async fn find_issued_coupon_by_review(
        &self,
        review_id: Uuid,
    ) -> StoreResult<Option<IssuedCoupon>> {
        Ok(self
            .lock()?
            .issued
            .values()
            .find(|c| c.review_id == review_id)
            .cloned())
    }

    async fn list_issued_coupons(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<IssuedCoupon>, i64)> {
        let tables = self.lock()?;
        let mut mine: Vec<IssuedCoupon> = tables
            .issued
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));

        let total = mine.len() as i64;
        let page = mine
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn active_code_exists(&self, business_id: Uuid, code: String) -> StoreResult<bool> {
        Ok(self.lock()?.issued.values().any(|c| {
            c.business_id == business_id && c.code == code && c.status == CouponStatus::Active
        }))
    }

    async fn mark_redeemed(
        &self,
        id: Uuid,
        redeemed_at: DateTime<Utc>,
        redeemed_by: Uuid,
    ) -> StoreResult<bool> {
        let mut tables = self.lock()?;
        match tables.issued.get_mut(&id) {
            Some(coupon) if coupon.status == CouponStatus::Active => {
                coupon.status = CouponStatus::Redeemed;
                coupon.redeemed_at = Some(redeemed_at);
                coupon.redeemed_by = Some(redeemed_by);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl PromotionStore for MemoryStore {
    async fn insert_promotional_coupon(
        &self,
        coupon: PromotionalCoupon,
    ) -> StoreResult<PromotionalCoupon> {
        let mut tables = self.lock()?;
        if tables
            .promotions
            .values()
            .any(|p| p.business_id == coupon.business_id && p.code == coupon.code)
        {
            return Err(StoreError::Conflict);
        }
        tables.promotions.insert(coupon.id, coupon.clone());
        Ok(coupon)
    }

    async fn find_promotional_coupon(&self, id: Uuid) -> StoreResult<Option<PromotionalCoupon>> {
        Ok(self.lock()?.promotions.get(&id).cloned())
    }

    async fn list_promotional_coupons(
        &self,
        business_id: Uuid,
    ) -> StoreResult<Vec<PromotionalCoupon>> {
        let tables = self.lock()?;
        let mut coupons: Vec<PromotionalCoupon> = tables
            .promotions
            .values()
            .filter(|p| p.business_id == business_id)
            .cloned()
            .collect();
        coupons.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(coupons)
    }

    async fn set_promotional_active(
        &self,
        id: Uuid,
        is_active: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<PromotionalCoupon>> {
        let mut tables = self.lock()?;
        Ok(tables.promotions.get_mut(&id).map(|coupon| {
            coupon.is_active = is_active;
            coupon.updated_at = now;
            coupon.clone()
        }))
    }

    async fn increment_usage(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<i32>> {
        let mut tables = self.lock()?;
        let Some(coupon) = tables.promotions.get_mut(&id) else {
            return Ok(None);
        };
        if !coupon.is_active || coupon.is_exhausted() {
            return Ok(None);
        }
        coupon.usage_count += 1;
        coupon.updated_at = now;
        Ok(Some(coupon.usage_count))
    }
}

#[async_trait]
impl RedemptionLog for MemoryStore {
    async fn append_redemption_event(&self, event: RedemptionEvent) -> StoreResult<()> {
        self.lock()?.events.push(event);
        Ok(())
    }

    async fn list_redemption_events(
        &self,
        scanner_business_id: Uuid,
        coupon_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<RedemptionEvent>, i64)> {
        let tables = self.lock()?;
        let matching: Vec<&RedemptionEvent> = tables
            .events
            .iter()
            .rev()
            .filter(|e| e.scanner_business_id == scanner_business_id)
            .filter(|e| coupon_id.is_none_or(|id| e.coupon_id == id))
            .collect();
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append_audit(&self, entry: AuditEntry) -> StoreResult<()> {
        self.lock()?.audit.push(entry);
        Ok(())
    }
}
