use chrono::Utc;

use crate::{
    audit::log_audit,
    dto::coupons::TemplateRequest,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::CouponTemplate,
    response::{ApiResponse, Meta},
    services::business_service::require_business,
    state::AppState,
};

pub async fn replace_template(
    state: &AppState,
    user: &AuthUser,
    payload: TemplateRequest,
) -> AppResult<ApiResponse<CouponTemplate>> {
    let business = require_business(state, user).await?;

    let template = state
        .templates
        .replace(
            business.id,
            payload.terms,
            payload.is_active.unwrap_or(true),
            Utc::now(),
        )
        .await?;

    log_audit(
        state.audit.as_ref(),
        Some(user.user_id),
        "coupon_template_replace",
        Some("coupon_templates"),
        Some(serde_json::json!({
            "business_id": business.id,
            "template_id": template.id,
            "reward_type": template.terms.reward.kind(),
        })),
    )
    .await;

    Ok(ApiResponse::success(
        "Coupon template saved",
        template,
        Some(Meta::empty()),
    ))
}

pub async fn current_template(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<CouponTemplate>> {
    let business = require_business(state, user).await?;
    let template = state
        .templates
        .current(business.id)
        .await?
        .ok_or(AppError::NotFound("Coupon template"))?;
    Ok(ApiResponse::success("Coupon template", template, None))
}
