//! Admission control for reviews.
//!
//! A review is only accepted from someone standing inside the business's
//! geofence, and at most once per cooldown window. Accepted reviews trigger
//! coupon issuance; an issuance failure never loses the review.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    models::{IssuedCoupon, Review},
    store::{BusinessStore, CouponStore, ReviewStore, StoreError},
};

use super::{
    geo::{GeoPoint, is_within_radius},
    issuer::{CouponIssuer, IssueError},
    templates::CouponTemplates,
};

pub const MAX_REVIEW_CHARS: usize = 2000;

pub const DEFAULT_REVIEW_COOLDOWN_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct ReviewSubmission {
    pub user_id: Uuid,
    pub business_id: Uuid,
    pub rating: i16,
    pub text: String,
    pub location: GeoPoint,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewAdmission {
    pub review: Review,
    pub coupon: Option<IssuedCoupon>,
    /// The review was stored but its coupon could not be issued yet.
    pub coupon_pending: bool,
}

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("invalid review: {0}")]
    InvalidReview(String),

    #[error("business not found")]
    BusinessNotFound,

    #[error("you must be at the business to review it")]
    OutOfGeofence,

    #[error("business already reviewed recently")]
    DuplicateReview,

    #[error("review not found")]
    ReviewNotFound,

    #[error("business has no active coupon template")]
    NoActiveTemplate,

    #[error(transparent)]
    Issue(#[from] IssueError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct ReviewGate {
    businesses: Arc<dyn BusinessStore>,
    reviews: Arc<dyn ReviewStore>,
    coupons: Arc<dyn CouponStore>,
    templates: CouponTemplates,
    issuer: CouponIssuer,
    cooldown: Duration,
}

impl ReviewGate {
    pub fn new(
        businesses: Arc<dyn BusinessStore>,
        reviews: Arc<dyn ReviewStore>,
        coupons: Arc<dyn CouponStore>,
        templates: CouponTemplates,
        issuer: CouponIssuer,
        cooldown: Duration,
    ) -> Self {
        Self {
            businesses,
            reviews,
            coupons,
            templates,
            issuer,
            cooldown,
        }
    }

    #[tracing::instrument(
        skip(self, submission),
        fields(user_id = %submission.user_id, business_id = %submission.business_id)
    )]
    pub async fn submit(
        &self,
        submission: ReviewSubmission,
        now: DateTime<Utc>,
    ) -> Result<ReviewAdmission, ReviewError> {
        if !(1..=5).contains(&submission.rating) {
            return Err(ReviewError::InvalidReview(
                "rating must be between 1 and 5".into(),
            ));
        }
        if submission.text.chars().count() > MAX_REVIEW_CHARS {
            return Err(ReviewError::InvalidReview(format!(
                "text must be at most {MAX_REVIEW_CHARS} characters"
            )));
        }

        let business = self
            .businesses
            .find_business(submission.business_id)
            .await?
            .filter(|business| business.is_active)
            .ok_or(ReviewError::BusinessNotFound)?;

        if !is_within_radius(business.location(), business.radius_m, submission.location) {
            info!("review rejected outside geofence");
            return Err(ReviewError::OutOfGeofence);
        }

        let review = Review {
            id: Uuid::new_v4(),
            user_id: submission.user_id,
            business_id: business.id,
            rating: submission.rating,
            text: submission.text,
            latitude: submission.location.latitude,
            longitude: submission.location.longitude,
            verified: true,
            created_at: now,
        };

        let inserted = self
            .reviews
            .insert_review_unless_recent(review.clone(), now - self.cooldown)
            .await?;
        if !inserted {
            return Err(ReviewError::DuplicateReview);
        }
        info!(review_id = %review.id, "review accepted");

        let (coupon, coupon_pending) = match self.issue_for(&review, now).await {
            Ok(coupon) => (coupon, false),
            Err(err) => {
                warn!(review_id = %review.id, error = %err, "coupon issuance deferred");
                (None, true)
            }
        };

        Ok(ReviewAdmission {
            review,
            coupon,
            coupon_pending,
        })
    }

    /// Issue the coupon for a review whose issuance failed earlier.
    /// Returns the existing coupon if one was already issued.
    #[tracing::instrument(skip(self))]
    pub async fn retry_coupon(
        &self,
        review_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<IssuedCoupon, ReviewError> {
        let review = self
            .reviews
            .find_review(review_id)
            .await?
            .filter(|review| review.user_id == user_id)
            .ok_or(ReviewError::ReviewNotFound)?;

        if let Some(existing) = self.coupons.find_issued_coupon_by_review(review.id).await? {
            return Ok(existing);
        }

        self.issue_for(&review, now)
            .await?
            .ok_or(ReviewError::NoActiveTemplate)
    }

    async fn issue_for(
        &self,
        review: &Review,
        now: DateTime<Utc>,
    ) -> Result<Option<IssuedCoupon>, ReviewError> {
        let Some(template) = self.templates.active(review.business_id).await? else {
            return Ok(None);
        };
        Ok(Some(self.issuer.issue(&template, review, now).await?))
    }
}
