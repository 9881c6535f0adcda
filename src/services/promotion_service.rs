use chrono::Utc;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::business_coupons::{
        CreatePromotionRequest, PromotionList, PromotionView, UpdatePromotionRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::PromotionalCoupon,
    response::{ApiResponse, Meta},
    rewards::NewPromotion,
    services::business_service::require_business,
    state::AppState,
};

pub async fn create_promotion(
    state: &AppState,
    user: &AuthUser,
    payload: CreatePromotionRequest,
) -> AppResult<ApiResponse<PromotionalCoupon>> {
    let business = require_business(state, user).await?;

    let coupon = state
        .promotions
        .create(
            business.id,
            NewPromotion {
                code: payload.code,
                title: payload.title,
                terms: payload.terms,
                usage_limit: payload.usage_limit,
                expires_at: payload.expires_at,
            },
            Utc::now(),
        )
        .await?;

    log_audit(
        state.audit.as_ref(),
        Some(user.user_id),
        "promotional_coupon_create",
        Some("promotional_coupons"),
        Some(serde_json::json!({ "coupon_id": coupon.id, "business_id": business.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Promotional coupon created",
        coupon,
        Some(Meta::empty()),
    ))
}

pub async fn list_promotions(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<PromotionList>> {
    let business = require_business(state, user).await?;
    let items: Vec<PromotionView> = state
        .promotions
        .list(business.id)
        .await?
        .into_iter()
        .map(PromotionView::from)
        .collect();
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Promotional coupons",
        PromotionList { items },
        Some(Meta::new(1, total.max(1), total)),
    ))
}

pub async fn update_promotion(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdatePromotionRequest,
) -> AppResult<ApiResponse<PromotionalCoupon>> {
    let business = require_business(state, user).await?;
    let coupon = state
        .promotions
        .set_active(business.id, id, payload.is_active, Utc::now())
        .await?;

    log_audit(
        state.audit.as_ref(),
        Some(user.user_id),
        "promotional_coupon_update",
        Some("promotional_coupons"),
        Some(serde_json::json!({ "coupon_id": coupon.id, "is_active": coupon.is_active })),
    )
    .await;

    Ok(ApiResponse::success(
        "Promotional coupon updated",
        coupon,
        Some(Meta::empty()),
    ))
}
