use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::{
        businesses::QrCodeData,
        coupons::{CouponList, CouponPolicy, CouponView, TemplateRequest},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::CouponTemplate,
    response::ApiResponse,
    routes::params::Pagination,
    services::{coupon_service, template_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_coupons))
        .route("/template", get(get_template).post(upsert_template))
        .route("/policy", get(get_policy))
        .route("/{id}", get(get_coupon))
        .route("/{id}/qr", get(get_coupon_qr))
}

#[utoipa::path(
    post,
    path = "/api/coupons/template",
    request_body = TemplateRequest,
    responses(
        (status = 200, description = "Template created or replaced", body = ApiResponse<CouponTemplate>),
        (status = 400, description = "Invalid reward terms"),
        (status = 403, description = "Caller is not a business account")
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn upsert_template(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<TemplateRequest>,
) -> AppResult<Json<ApiResponse<CouponTemplate>>> {
    let resp = template_service::replace_template(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/coupons/template",
    responses(
        (status = 200, description = "Current template", body = ApiResponse<CouponTemplate>),
        (status = 404, description = "No template yet")
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn get_template(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CouponTemplate>>> {
    let resp = template_service::current_template(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/coupons/policy",
    responses(
        (status = 200, description = "Coupon validity policy", body = ApiResponse<CouponPolicy>)
    ),
    tag = "Coupons"
)]
pub async fn get_policy() -> Json<ApiResponse<CouponPolicy>> {
    Json(coupon_service::policy())
}

#[utoipa::path(
    get,
    path = "/api/coupons",
    params(Pagination),
    responses(
        (status = 200, description = "Caller's coupons", body = ApiResponse<CouponList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn list_coupons(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<CouponList>>> {
    let resp = coupon_service::list_my_coupons(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/coupons/{id}",
    params(("id" = Uuid, Path, description = "Coupon ID")),
    responses(
        (status = 200, description = "Coupon with derived status", body = ApiResponse<CouponView>),
        (status = 404, description = "Coupon not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn get_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CouponView>>> {
    let resp = coupon_service::get_coupon(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/coupons/{id}/qr",
    params(("id" = Uuid, Path, description = "Coupon ID")),
    responses(
        (status = 200, description = "QR payload to show at the counter", body = ApiResponse<QrCodeData>),
        (status = 404, description = "Coupon not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn get_coupon_qr(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<QrCodeData>>> {
    let resp = coupon_service::coupon_qr(&state, &user, id).await?;
    Ok(Json(resp))
}
