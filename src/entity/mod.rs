pub mod audit_logs;
pub mod businesses;
pub mod coupon_templates;
pub mod issued_coupons;
pub mod promotional_coupons;
pub mod redemption_events;
pub mod reviews;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use businesses::Entity as Businesses;
pub use coupon_templates::Entity as CouponTemplates;
pub use issued_coupons::Entity as IssuedCoupons;
pub use promotional_coupons::Entity as PromotionalCoupons;
pub use redemption_events::Entity as RedemptionEvents;
pub use reviews::Entity as Reviews;
pub use users::Entity as Users;
