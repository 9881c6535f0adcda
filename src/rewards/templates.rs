use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::{
    models::CouponTemplate,
    store::{StoreError, TemplateStore},
};

use super::terms::{RewardTerms, TermsError};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error(transparent)]
    InvalidTerms(#[from] TermsError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One current reward template per business. Replacing it keeps the old row
/// for history; coupons already issued hold their own copy of the terms.
#[derive(Clone)]
pub struct CouponTemplates {
    store: Arc<dyn TemplateStore>,
}

impl CouponTemplates {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, terms), fields(reward = terms.reward.kind()))]
    pub async fn replace(
        &self,
        business_id: Uuid,
        terms: RewardTerms,
        is_active: bool,
        now: DateTime<Utc>,
    ) -> Result<CouponTemplate, TemplateError> {
        terms.validate()?;

        let template = self
            .store
            .replace_template(CouponTemplate {
                id: Uuid::new_v4(),
                business_id,
                terms,
                is_active,
                created_at: now,
            })
            .await?;

        info!(template_id = %template.id, "coupon template replaced");
        Ok(template)
    }

    pub async fn current(&self, business_id: Uuid) -> Result<Option<CouponTemplate>, StoreError> {
        self.store.current_template(business_id).await
    }

    /// The current template, only if it is switched on.
    pub async fn active(&self, business_id: Uuid) -> Result<Option<CouponTemplate>, StoreError> {
        Ok(self
            .current(business_id)
            .await?
            .filter(|template| template.is_active))
    }
}
