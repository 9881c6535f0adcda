use chrono::Utc;

use crate::{
    dto::business_coupons::{
        RedeemedCoupon, RedemptionEventList, ScanRedeemRequest, ScanRedeemResponse,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::CouponKind,
    response::{ApiResponse, Meta},
    rewards::qr::QrPayload,
    routes::params::EventQuery,
    services::business_service::require_business,
    state::AppState,
    store::with_retry,
};

/// Redeem the coupon behind a scanned QR at the caller's business.
///
/// The id is looked up among issued review coupons first and falls through to
/// promotional coupons, which then reports `NotFound` if neither knows it.
pub async fn scan_redeem(
    state: &AppState,
    user: &AuthUser,
    payload: ScanRedeemRequest,
) -> AppResult<ApiResponse<ScanRedeemResponse>> {
    let business = require_business(state, user).await?;
    let coupon_id = QrPayload::decode(&payload.qr_code_data)?.expect_coupon()?;
    let now = Utc::now();

    let is_review_coupon = with_retry(&state.config.write_policy, "find_issued_coupon", || {
        state.coupons.find_issued_coupon(coupon_id)
    })
    .await
    .map_err(|err| {
        tracing::error!(error = %err, %coupon_id, "coupon lookup failed");
        AppError::RedemptionUnavailable
    })?
    .is_some();

    let response = if is_review_coupon {
        let redemption = state.redemptions.redeem(coupon_id, business.id, now).await?;
        ScanRedeemResponse {
            coupon_kind: CouponKind::Review,
            coupon: RedeemedCoupon::Review(redemption.coupon),
            redeemed_at: redemption.redeemed_at,
        }
    } else {
        let redemption = state.promotions.redeem(coupon_id, business.id, now).await?;
        ScanRedeemResponse {
            coupon_kind: CouponKind::Promotional,
            coupon: RedeemedCoupon::Promotional(redemption.coupon),
            redeemed_at: redemption.redeemed_at,
        }
    };

    Ok(ApiResponse::success(
        "Coupon redeemed",
        response,
        Some(Meta::empty()),
    ))
}

pub async fn list_events(
    state: &AppState,
    user: &AuthUser,
    query: EventQuery,
) -> AppResult<ApiResponse<RedemptionEventList>> {
    let business = require_business(state, user).await?;
    let (page, per_page, offset) = query.pagination().normalize();
    let (items, total) = state
        .redemption_log
        .list_redemption_events(business.id, query.coupon_id, per_page, offset)
        .await?;
    Ok(ApiResponse::success(
        "Redemption events",
        RedemptionEventList { items },
        Some(Meta::new(page, per_page, total)),
    ))
}
