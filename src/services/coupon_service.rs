use chrono::Utc;
use uuid::Uuid;

use crate::{
    dto::{
        businesses::QrCodeData,
        coupons::{CouponList, CouponPolicy, CouponView},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{COUPON_VALIDITY_SECS, IssuedCoupon, Role},
    response::{ApiResponse, Meta},
    rewards::qr::QrPayload,
    routes::params::Pagination,
    state::AppState,
};

pub fn policy() -> ApiResponse<CouponPolicy> {
    ApiResponse::success(
        "Coupon policy",
        CouponPolicy {
            validity_window_seconds: COUPON_VALIDITY_SECS,
        },
        None,
    )
}

pub async fn list_my_coupons(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CouponList>> {
    let (page, limit, offset) = pagination.normalize();
    let (coupons, total) = state
        .coupons
        .list_issued_coupons(user.user_id, limit, offset)
        .await?;

    let now = Utc::now();
    let items = coupons
        .into_iter()
        .map(|coupon| CouponView::at(coupon, now))
        .collect();

    Ok(ApiResponse::success(
        "Coupons",
        CouponList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

/// Status re-query. Safe to repeat, e.g. after an unconfirmed redemption.
pub async fn get_coupon(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<CouponView>> {
    let coupon = visible_coupon(state, user, id).await?;
    Ok(ApiResponse::success(
        "Coupon",
        CouponView::at(coupon, Utc::now()),
        None,
    ))
}

pub async fn coupon_qr(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<QrCodeData>> {
    let coupon = visible_coupon(state, user, id).await?;
    if coupon.user_id != user.user_id {
        return Err(AppError::NotFound("Coupon"));
    }
    let qr_code_data = QrPayload::coupon(coupon.id).encode()?;
    Ok(ApiResponse::success(
        "Coupon QR",
        QrCodeData { qr_code_data },
        None,
    ))
}

/// A coupon is visible to the customer who holds it and to the business it
/// is redeemable at. Anyone else gets `NotFound`.
async fn visible_coupon(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<IssuedCoupon> {
    let coupon = state
        .coupons
        .find_issued_coupon(id)
        .await?
        .ok_or(AppError::NotFound("Coupon"))?;

    if coupon.user_id == user.user_id {
        return Ok(coupon);
    }
    if user.role == Role::Business {
        let owns = state
            .businesses
            .find_business_by_owner(user.user_id)
            .await?
            .is_some_and(|business| business.id == coupon.business_id);
        if owns {
            return Ok(coupon);
        }
    }
    Err(AppError::NotFound("Coupon"))
}
