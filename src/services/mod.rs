pub mod auth_service;
pub mod business_service;
pub mod coupon_service;
pub mod promotion_service;
pub mod redemption_service;
pub mod review_service;
pub mod template_service;
