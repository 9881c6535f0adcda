use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::business_coupons::{
        CreatePromotionRequest, PromotionList, RedemptionEventList, ScanRedeemRequest,
        ScanRedeemResponse, UpdatePromotionRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::PromotionalCoupon,
    response::ApiResponse,
    routes::params::EventQuery,
    services::{promotion_service, redemption_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_promotion).get(list_promotions))
        .route("/scan-redeem", post(scan_redeem))
        .route("/events", get(list_events))
        .route("/{id}", patch(update_promotion))
}

#[utoipa::path(
    post,
    path = "/api/business-coupons/scan-redeem",
    request_body = ScanRedeemRequest,
    responses(
        (status = 200, description = "Coupon redeemed", body = ApiResponse<ScanRedeemResponse>),
        (status = 400, description = "invalid_qr_payload"),
        (status = 403, description = "wrong_business"),
        (status = 404, description = "not_found"),
        (status = 409, description = "already_redeemed, usage_limit_reached or coupon_inactive"),
        (status = 410, description = "expired"),
        (status = 503, description = "redemption_unavailable, re-query the coupon status")
    ),
    security(("bearer_auth" = [])),
    tag = "Business coupons"
)]
pub async fn scan_redeem(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ScanRedeemRequest>,
) -> AppResult<Json<ApiResponse<ScanRedeemResponse>>> {
    let resp = redemption_service::scan_redeem(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/business-coupons",
    request_body = CreatePromotionRequest,
    responses(
        (status = 201, description = "Promotional coupon created", body = ApiResponse<PromotionalCoupon>),
        (status = 400, description = "Invalid coupon"),
        (status = 409, description = "Code already in use")
    ),
    security(("bearer_auth" = [])),
    tag = "Business coupons"
)]
pub async fn create_promotion(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePromotionRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<PromotionalCoupon>>)> {
    let resp = promotion_service::create_promotion(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/business-coupons",
    responses(
        (status = 200, description = "Promotional coupons of the caller's business", body = ApiResponse<PromotionList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Business coupons"
)]
pub async fn list_promotions(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<PromotionList>>> {
    let resp = promotion_service::list_promotions(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/business-coupons/{id}",
    params(("id" = Uuid, Path, description = "Promotional coupon ID")),
    request_body = UpdatePromotionRequest,
    responses(
        (status = 200, description = "Promotional coupon updated", body = ApiResponse<PromotionalCoupon>),
        (status = 404, description = "Promotional coupon not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Business coupons"
)]
pub async fn update_promotion(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePromotionRequest>,
) -> AppResult<Json<ApiResponse<PromotionalCoupon>>> {
    let resp = promotion_service::update_promotion(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/business-coupons/events",
    params(EventQuery),
    responses(
        (status = 200, description = "Redemption attempts at the caller's business, newest first", body = ApiResponse<RedemptionEventList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Business coupons"
)]
pub async fn list_events(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<EventQuery>,
) -> AppResult<Json<ApiResponse<RedemptionEventList>>> {
    let resp = redemption_service::list_events(&state, &user, query).await?;
    Ok(Json(resp))
}
