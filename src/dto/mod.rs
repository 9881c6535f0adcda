pub mod auth;
pub mod business_coupons;
pub mod businesses;
pub mod coupons;
pub mod reviews;
