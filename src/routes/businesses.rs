use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::businesses::{CreateBusinessRequest, QrCodeData},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Business,
    response::ApiResponse,
    services::business_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_business))
        .route("/{id}", get(get_business))
        .route("/{id}/qr", get(get_business_qr))
}

#[utoipa::path(
    post,
    path = "/api/businesses",
    request_body = CreateBusinessRequest,
    responses(
        (status = 201, description = "Business registered", body = ApiResponse<Business>),
        (status = 403, description = "Caller is not a business account"),
        (status = 409, description = "Account already owns a business")
    ),
    security(("bearer_auth" = [])),
    tag = "Businesses"
)]
pub async fn create_business(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateBusinessRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Business>>)> {
    let resp = business_service::register_business(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/businesses/{id}",
    params(("id" = Uuid, Path, description = "Business ID")),
    responses(
        (status = 200, description = "Business profile", body = ApiResponse<Business>),
        (status = 404, description = "Business not found")
    ),
    tag = "Businesses"
)]
pub async fn get_business(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Business>>> {
    let resp = business_service::get_business(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/businesses/{id}/qr",
    params(("id" = Uuid, Path, description = "Business ID")),
    responses(
        (status = 200, description = "Business profile QR payload", body = ApiResponse<QrCodeData>),
        (status = 404, description = "Business not found")
    ),
    tag = "Businesses"
)]
pub async fn get_business_qr(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<QrCodeData>>> {
    let resp = business_service::business_qr(&state, id).await?;
    Ok(Json(resp))
}
