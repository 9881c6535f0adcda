use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        business_coupons::{
            CreatePromotionRequest, PromotionList, PromotionView, RedeemedCoupon,
            RedemptionEventList, ScanRedeemRequest, ScanRedeemResponse, UpdatePromotionRequest,
        },
        businesses::{CreateBusinessRequest, QrCodeData},
        coupons::{CouponList, CouponPolicy, CouponView, TemplateRequest},
        reviews::CreateReviewRequest,
    },
    error::ErrorData,
    models::{
        Business, CouponKind, CouponState, CouponStatus, CouponTemplate, IssuedCoupon,
        PromotionalCoupon, RedemptionEvent, RedemptionOutcome, RejectionReason, Review, Role,
        User,
    },
    response::{ApiResponse, Meta},
    rewards::{ReviewAdmission, Reward, RewardTerms},
    routes::{auth, business_coupons, businesses, coupons, health, params, reviews},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        businesses::create_business,
        businesses::get_business,
        businesses::get_business_qr,
        reviews::create_review,
        reviews::retry_review_coupon,
        coupons::upsert_template,
        coupons::get_template,
        coupons::get_policy,
        coupons::list_coupons,
        coupons::get_coupon,
        coupons::get_coupon_qr,
        business_coupons::scan_redeem,
        business_coupons::create_promotion,
        business_coupons::list_promotions,
        business_coupons::update_promotion,
        business_coupons::list_events
    ),
    components(
        schemas(
            User,
            Role,
            Business,
            Review,
            CouponTemplate,
            IssuedCoupon,
            CouponStatus,
            CouponState,
            PromotionalCoupon,
            CouponKind,
            RedemptionEvent,
            RedemptionOutcome,
            RejectionReason,
            Reward,
            RewardTerms,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            CreateBusinessRequest,
            QrCodeData,
            CreateReviewRequest,
            ReviewAdmission,
            TemplateRequest,
            CouponView,
            CouponList,
            CouponPolicy,
            ScanRedeemRequest,
            ScanRedeemResponse,
            RedeemedCoupon,
            CreatePromotionRequest,
            UpdatePromotionRequest,
            PromotionList,
            PromotionView,
            RedemptionEventList,
            ErrorData,
            params::Pagination,
            params::EventQuery,
            Meta,
            ApiResponse<ReviewAdmission>,
            ApiResponse<ScanRedeemResponse>,
            ApiResponse<ErrorData>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Businesses", description = "Business registration and profile"),
        (name = "Reviews", description = "Geofenced review submission"),
        (name = "Coupons", description = "Reward templates and issued coupons"),
        (name = "Business coupons", description = "Point-of-sale redemption and promotional coupons"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
