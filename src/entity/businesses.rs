use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "businesses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    #[sea_orm(column_type = "Double")]
    pub latitude: f64,
    #[sea_orm(column_type = "Double")]
    pub longitude: f64,
    #[sea_orm(column_type = "Double")]
    pub radius_m: f64,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::OwnerId",
        to = "super::users::Column::Id"
    )]
    Users,
    #[sea_orm(has_many = "super::reviews::Entity")]
    Reviews,
    #[sea_orm(has_many = "super::coupon_templates::Entity")]
    CouponTemplates,
    #[sea_orm(has_many = "super::issued_coupons::Entity")]
    IssuedCoupons,
    #[sea_orm(has_many = "super::promotional_coupons::Entity")]
    PromotionalCoupons,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::reviews::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl Related<super::coupon_templates::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CouponTemplates.def()
    }
}

impl Related<super::issued_coupons::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::IssuedCoupons.def()
    }
}

impl Related<super::promotional_coupons::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PromotionalCoupons.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
