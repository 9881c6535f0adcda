use chrono::Utc;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::businesses::{CreateBusinessRequest, QrCodeData},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_role},
    models::{Business, Role},
    response::{ApiResponse, Meta},
    rewards::{
        geo::{DEFAULT_RADIUS_M, GeoPoint},
        qr::QrPayload,
    },
    state::AppState,
    store::StoreError,
};

const MAX_RADIUS_M: f64 = 5_000.0;

/// The business operated by the authenticated owner. This is the scanner
/// identity at the point of sale.
pub async fn require_business(state: &AppState, user: &AuthUser) -> AppResult<Business> {
    ensure_role(user, Role::Business)?;
    state
        .businesses
        .find_business_by_owner(user.user_id)
        .await?
        .ok_or(AppError::NotFound("Business"))
}

pub async fn register_business(
    state: &AppState,
    user: &AuthUser,
    payload: CreateBusinessRequest,
) -> AppResult<ApiResponse<Business>> {
    ensure_role(user, Role::Business)?;

    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("Name is required".into()));
    }
    if !GeoPoint::new(payload.latitude, payload.longitude).is_valid() {
        return Err(AppError::BadRequest("Coordinates are out of range".into()));
    }
    let radius_m = payload.radius_m.unwrap_or(DEFAULT_RADIUS_M);
    if !radius_m.is_finite() || radius_m <= 0.0 || radius_m > MAX_RADIUS_M {
        return Err(AppError::BadRequest(format!(
            "Radius must be between 0 and {MAX_RADIUS_M} meters"
        )));
    }

    let business = state
        .businesses
        .insert_business(Business {
            id: Uuid::new_v4(),
            owner_id: user.user_id,
            name,
            latitude: payload.latitude,
            longitude: payload.longitude,
            radius_m,
            is_active: true,
            created_at: Utc::now(),
        })
        .await
        .map_err(|err| match err {
            StoreError::Conflict => AppError::Conflict("Account already owns a business".into()),
            other => other.into(),
        })?;

    log_audit(
        state.audit.as_ref(),
        Some(user.user_id),
        "business_register",
        Some("businesses"),
        Some(serde_json::json!({ "business_id": business.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Business created",
        business,
        Some(Meta::empty()),
    ))
}

pub async fn get_business(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Business>> {
    let business = state
        .businesses
        .find_business(id)
        .await?
        .ok_or(AppError::NotFound("Business"))?;
    Ok(ApiResponse::success("Business", business, None))
}

/// Payload of the QR printed at the counter; scanning it opens the profile.
pub async fn business_qr(state: &AppState, id: Uuid) -> AppResult<ApiResponse<QrCodeData>> {
    let business = state
        .businesses
        .find_business(id)
        .await?
        .ok_or(AppError::NotFound("Business"))?;
    let qr_code_data = QrPayload::business(business.id).encode()?;
    Ok(ApiResponse::success(
        "Business QR",
        QrCodeData { qr_code_data },
        None,
    ))
}
