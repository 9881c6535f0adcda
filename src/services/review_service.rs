use chrono::Utc;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::{coupons::CouponView, reviews::CreateReviewRequest},
    error::AppResult,
    middleware::auth::{AuthUser, ensure_role},
    models::Role,
    response::{ApiResponse, Meta},
    rewards::{GeoPoint, ReviewAdmission, ReviewSubmission},
    state::AppState,
};

pub async fn submit_review(
    state: &AppState,
    user: &AuthUser,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<ReviewAdmission>> {
    ensure_role(user, Role::User)?;

    let admission = state
        .review_gate
        .submit(
            ReviewSubmission {
                user_id: user.user_id,
                business_id: payload.business_id,
                rating: payload.rating,
                text: payload.text,
                location: GeoPoint::new(payload.latitude, payload.longitude),
            },
            Utc::now(),
        )
        .await?;

    log_audit(
        state.audit.as_ref(),
        Some(user.user_id),
        "review_submit",
        Some("reviews"),
        Some(serde_json::json!({
            "review_id": admission.review.id,
            "business_id": admission.review.business_id,
            "coupon_id": admission.coupon.as_ref().map(|c| c.id),
            "coupon_pending": admission.coupon_pending,
        })),
    )
    .await;

    let message = match (&admission.coupon, admission.coupon_pending) {
        (Some(_), _) => "Review accepted, coupon issued",
        (None, true) => "Review accepted, coupon pending",
        (None, false) => "Review accepted",
    };
    Ok(ApiResponse::success(message, admission, Some(Meta::empty())))
}

pub async fn retry_coupon(
    state: &AppState,
    user: &AuthUser,
    review_id: Uuid,
) -> AppResult<ApiResponse<CouponView>> {
    let now = Utc::now();
    let coupon = state
        .review_gate
        .retry_coupon(review_id, user.user_id, now)
        .await?;

    Ok(ApiResponse::success(
        "Coupon issued",
        CouponView::at(coupon, now),
        Some(Meta::empty()),
    ))
}
