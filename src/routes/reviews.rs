use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use uuid::Uuid;

use crate::{
    dto::{coupons::CouponView, reviews::CreateReviewRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    rewards::ReviewAdmission,
    services::review_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_review))
        .route("/{id}/coupon", post(retry_review_coupon))
}

#[utoipa::path(
    post,
    path = "/api/reviews",
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review accepted", body = ApiResponse<ReviewAdmission>),
        (status = 400, description = "Invalid rating or text"),
        (status = 403, description = "Reviewer is outside the business geofence"),
        (status = 404, description = "Business not found or inactive"),
        (status = 409, description = "Business already reviewed within the cooldown")
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ReviewAdmission>>)> {
    let resp = review_service::submit_review(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/reviews/{id}/coupon",
    params(("id" = Uuid, Path, description = "Review ID")),
    responses(
        (status = 200, description = "Coupon for the review", body = ApiResponse<CouponView>),
        (status = 404, description = "Review not found"),
        (status = 409, description = "Business has no active template")
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn retry_review_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CouponView>>> {
    let resp = review_service::retry_coupon(&state, &user, id).await?;
    Ok(Json(resp))
}
