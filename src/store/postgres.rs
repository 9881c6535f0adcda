use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlxPostgresConnector, Statement,
    TransactionTrait,
    sea_query::{Expr, LockType},
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    entity::{
        audit_logs::ActiveModel as AuditActive,
        businesses::{
            ActiveModel as BusinessActive, Column as BusinessCol, Entity as Businesses,
            Model as BusinessModel,
        },
        coupon_templates::{
            ActiveModel as TemplateActive, Column as TemplateCol, Entity as CouponTemplates,
            Model as TemplateModel,
        },
        issued_coupons::{
            ActiveModel as IssuedActive, Column as IssuedCol, Entity as IssuedCoupons,
            Model as IssuedModel,
        },
        promotional_coupons::{
            ActiveModel as PromoActive, Entity as PromotionalCoupons, Column as PromoCol,
            Model as PromoModel,
        },
        redemption_events::{
            Column as EventCol, Entity as RedemptionEvents, Model as EventModel,
        },
        reviews::{
            ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews,
            Model as ReviewModel,
        },
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    },
    models::{
        AuditEntry, Business, CouponKind, CouponStatus, CouponTemplate, IssuedCoupon,
        PromotionalCoupon, RedemptionEvent, RedemptionOutcome, Review, Role, User,
    },
};

use super::{
    AuditStore, BusinessStore, CouponStore, PromotionStore, RedemptionLog, ReviewStore,
    StoreError, StoreResult, TemplateStore, UserStore,
};

/// Postgres-backed store. Shares one connection pool between raw `sqlx`
/// queries and the SeaORM entities.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    orm: DatabaseConnection,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        let orm = SqlxPostgresConnector::from_sqlx_postgres_pool(pool.clone());
        Self { pool, orm }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: User) -> StoreResult<User> {
        let model = UserActive {
            id: Set(user.id),
            email: Set(user.email),
            password_hash: Set(user.password_hash),
            role: Set(user.role.as_str().to_string()),
            created_at: Set(user.created_at.into()),
        }
        .insert(&self.orm)
        .await?;

        user_from_entity(model)
    }

    async fn find_user_by_email(&self, email: String) -> StoreResult<Option<User>> {
        Users::find()
            .filter(UserCol::Email.eq(email))
            .one(&self.orm)
            .await?
            .map(user_from_entity)
            .transpose()
    }
}

#[async_trait]
impl BusinessStore for PgStore {
    async fn insert_business(&self, business: Business) -> StoreResult<Business> {
        let model = BusinessActive {
            id: Set(business.id),
            owner_id: Set(business.owner_id),
            name: Set(business.name),
            latitude: Set(business.latitude),
            longitude: Set(business.longitude),
            radius_m: Set(business.radius_m),
            is_active: Set(business.is_active),
            created_at: Set(business.created_at.into()),
        }
        .insert(&self.orm)
        .await?;

        Ok(business_from_entity(model))
    }

    async fn find_business(&self, id: Uuid) -> StoreResult<Option<Business>> {
        Ok(Businesses::find_by_id(id)
            .one(&self.orm)
            .await?
            .map(business_from_entity))
    }

    async fn find_business_by_owner(&self, owner_id: Uuid) -> StoreResult<Option<Business>> {
        Ok(Businesses::find()
            .filter(BusinessCol::OwnerId.eq(owner_id))
            .one(&self.orm)
            .await?
            .map(business_from_entity))
    }
}

#[async_trait]
impl ReviewStore for PgStore {
    #[tracing::instrument(
        skip(self, review),
        fields(user_id = %review.user_id, business_id = %review.business_id)
    )]
    async fn insert_review_unless_recent(
        &self,
        review: Review,
        since: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let txn = self.orm.begin().await?;

        // serialize submissions of the same user for the same business
        let lock_key = format!("review:{}:{}", review.user_id, review.business_id);
        txn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT pg_advisory_xact_lock(hashtextextended($1, 0))",
            [lock_key.into()],
        ))
        .await?;

        let recent = Reviews::find()
            .filter(ReviewCol::UserId.eq(review.user_id))
            .filter(ReviewCol::BusinessId.eq(review.business_id))
            .filter(ReviewCol::CreatedAt.gte(since))
            .count(&txn)
            .await?;

        if recent > 0 {
            txn.rollback().await?;
            return Ok(false);
        }

        ReviewActive {
            id: Set(review.id),
            user_id: Set(review.user_id),
            business_id: Set(review.business_id),
            rating: Set(review.rating),
            body: Set(review.text),
            latitude: Set(review.latitude),
            longitude: Set(review.longitude),
            verified: Set(review.verified),
            created_at: Set(review.created_at.into()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(true)
    }

    async fn find_review(&self, id: Uuid) -> StoreResult<Option<Review>> {
        Ok(Reviews::find_by_id(id)
            .one(&self.orm)
            .await?
            .map(review_from_entity))
    }
}

#[async_trait]
impl TemplateStore for PgStore {
    async fn current_template(&self, business_id: Uuid) -> StoreResult<Option<CouponTemplate>> {
        CouponTemplates::find()
            .filter(TemplateCol::BusinessId.eq(business_id))
            .filter(TemplateCol::IsCurrent.eq(true))
            .one(&self.orm)
            .await?
            .map(template_from_entity)
            .transpose()
    }

    async fn replace_template(&self, template: CouponTemplate) -> StoreResult<CouponTemplate> {
        let txn = self.orm.begin().await?;

        // one writer per business at a time
        Businesses::find_by_id(template.business_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?;

        CouponTemplates::update_many()
            .col_expr(TemplateCol::IsCurrent, Expr::value(false))
            .filter(TemplateCol::BusinessId.eq(template.business_id))
            .filter(TemplateCol::IsCurrent.eq(true))
            .exec(&txn)
            .await?;

        let model = TemplateActive {
            id: Set(template.id),
            business_id: Set(template.business_id),
            terms: Set(serde_json::to_value(&template.terms)?),
            is_active: Set(template.is_active),
            is_current: Set(true),
            created_at: Set(template.created_at.into()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        template_from_entity(model)
    }
}

#[async_trait]
impl CouponStore for PgStore {
    async fn insert_issued_coupon(&self, coupon: IssuedCoupon) -> StoreResult<IssuedCoupon> {
        let model = IssuedActive {
            id: Set(coupon.id),
            code: Set(coupon.code),
            user_id: Set(coupon.user_id),
            business_id: Set(coupon.business_id),
            review_id: Set(coupon.review_id),
            template_id: Set(coupon.template_id),
            terms: Set(serde_json::to_value(&coupon.terms)?),
            issued_at: Set(coupon.issued_at.into()),
            valid_until: Set(coupon.valid_until.into()),
            status: Set(coupon.status.as_str().to_string()),
            redeemed_at: Set(coupon.redeemed_at.map(Into::into)),
            redeemed_by: Set(coupon.redeemed_by),
        }
        .insert(&self.orm)
        .await?;

        issued_from_entity(model)
    }

    async fn find_issued_coupon(&self, id: Uuid) -> StoreResult<Option<IssuedCoupon>> {
        IssuedCoupons::find_by_id(id)
            .one(&self.orm)
            .await?
            .map(issued_from_entity)
            .transpose()
    }

    async fn find_issued_coupon_by_review(
        &self,
        review_id: Uuid,
    ) -> StoreResult<Option<IssuedCoupon>> {
        IssuedCoupons::find()
            .filter(IssuedCol::ReviewId.eq(review_id))
            .one(&self.orm)
            .await?
            .map(issued_from_entity)
            .transpose()
    }

    async fn list_issued_coupons(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<IssuedCoupon>, i64)> {
        let finder = IssuedCoupons::find()
            .filter(IssuedCol::UserId.eq(user_id))
            .order_by_desc(IssuedCol::IssuedAt);

        let total = finder.clone().count(&self.orm).await? as i64;

        let coupons = finder
            .limit(limit.max(0) as u64)
            .offset(offset.max(0) as u64)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(issued_from_entity)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok((coupons, total))
    }

    async fn active_code_exists(&self, business_id: Uuid, code: String) -> StoreResult<bool> {
        let count = IssuedCoupons::find()
            .filter(IssuedCol::BusinessId.eq(business_id))
            .filter(IssuedCol::Code.eq(code))
            .filter(IssuedCol::Status.eq(CouponStatus::Active.as_str()))
            .count(&self.orm)
            .await?;
        Ok(count > 0)
    }

    #[tracing::instrument(skip(self), fields(coupon_id = %id))]
    async fn mark_redeemed(
        &self,
        id: Uuid,
        redeemed_at: DateTime<Utc>,
        redeemed_by: Uuid,
    ) -> StoreResult<bool> {
        let result = IssuedCoupons::update_many()
            .col_expr(IssuedCol::Status, Expr::value(CouponStatus::Redeemed.as_str()))
            .col_expr(IssuedCol::RedeemedAt, Expr::value(redeemed_at))
            .col_expr(IssuedCol::RedeemedBy, Expr::value(redeemed_by))
            .filter(IssuedCol::Id.eq(id))
            .filter(IssuedCol::Status.eq(CouponStatus::Active.as_str()))
            .exec(&self.orm)
            .await?;

        Ok(result.rows_affected == 1)
    }
}

#[async_trait]
impl PromotionStore for PgStore {
    async fn insert_promotional_coupon(
        &self,
        coupon: PromotionalCoupon,
    ) -> StoreResult<PromotionalCoupon> {
        let model = PromoActive {
            id: Set(coupon.id),
            business_id: Set(coupon.business_id),
            code: Set(coupon.code),
            title: Set(coupon.title),
            terms: Set(serde_json::to_value(&coupon.terms)?),
            usage_limit: Set(coupon.usage_limit),
            usage_count: Set(coupon.usage_count),
            is_active: Set(coupon.is_active),
            expires_at: Set(coupon.expires_at.map(Into::into)),
            created_at: Set(coupon.created_at.into()),
            updated_at: Set(coupon.updated_at.into()),
        }
        .insert(&self.orm)
        .await?;

        promo_from_entity(model)
    }

    async fn find_promotional_coupon(&self, id: Uuid) -> StoreResult<Option<PromotionalCoupon>> {
        PromotionalCoupons::find_by_id(id)
            .one(&self.orm)
            .await?
            .map(promo_from_entity)
            .transpose()
    }

    async fn list_promotional_coupons(
        &self,
        business_id: Uuid,
    ) -> StoreResult<Vec<PromotionalCoupon>> {
        PromotionalCoupons::find()
            .filter(PromoCol::BusinessId.eq(business_id))
            .order_by_desc(PromoCol::CreatedAt)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(promo_from_entity)
            .collect()
    }

    async fn set_promotional_active(
        &self,
        id: Uuid,
        is_active: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<PromotionalCoupon>> {
        let Some(model) = PromotionalCoupons::find_by_id(id).one(&self.orm).await? else {
            return Ok(None);
        };

        // only the changed columns are written, usage_count is left alone
        let mut active: PromoActive = model.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(now.into());
        let model = active.update(&self.orm).await?;

        promo_from_entity(model).map(Some)
    }

    #[tracing::instrument(skip(self), fields(coupon_id = %id))]
    async fn increment_usage(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<i32>> {
        let count: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE promotional_coupons
            SET usage_count = usage_count + 1, updated_at = $2
            WHERE id = $1
              AND is_active
              AND (usage_limit IS NULL OR usage_count < usage_limit)
            RETURNING usage_count
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count)
    }
}

#[async_trait]
impl RedemptionLog for PgStore {
    async fn append_redemption_event(&self, event: RedemptionEvent) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO redemption_events (id, coupon_id, coupon_kind, scanner_business_id, outcome, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.id)
        .bind(event.coupon_id)
        .bind(event.coupon_kind.map(|kind| kind.as_str()))
        .bind(event.scanner_business_id)
        .bind(event.outcome.as_str())
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_redemption_events(
        &self,
        scanner_business_id: Uuid,
        coupon_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<RedemptionEvent>, i64)> {
        let mut finder =
            RedemptionEvents::find().filter(EventCol::ScannerBusinessId.eq(scanner_business_id));
        if let Some(coupon_id) = coupon_id {
            finder = finder.filter(EventCol::CouponId.eq(coupon_id));
        }
        let finder = finder.order_by_desc(EventCol::CreatedAt);

        let total = finder.clone().count(&self.orm).await? as i64;

        let events = finder
            .limit(limit.max(0) as u64)
            .offset(offset.max(0) as u64)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(event_from_entity)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok((events, total))
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn append_audit(&self, entry: AuditEntry) -> StoreResult<()> {
        AuditActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(entry.user_id),
            action: Set(entry.action),
            resource: Set(entry.resource),
            metadata: Set(entry.metadata),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.orm)
        .await?;

        Ok(())
    }
}

fn user_from_entity(model: UserModel) -> StoreResult<User> {
    let role = Role::parse(&model.role)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown role {:?}", model.role)))?;
    Ok(User {
        id: model.id,
        email: model.email,
        password_hash: model.password_hash,
        role,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn business_from_entity(model: BusinessModel) -> Business {
    Business {
        id: model.id,
        owner_id: model.owner_id,
        name: model.name,
        latitude: model.latitude,
        longitude: model.longitude,
        radius_m: model.radius_m,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn review_from_entity(model: ReviewModel) -> Review {
    Review {
        id: model.id,
        user_id: model.user_id,
        business_id: model.business_id,
        rating: model.rating,
        text: model.body,
        latitude: model.latitude,
        longitude: model.longitude,
        verified: model.verified,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn template_from_entity(model: TemplateModel) -> StoreResult<CouponTemplate> {
    Ok(CouponTemplate {
        id: model.id,
        business_id: model.business_id,
        terms: serde_json::from_value(model.terms)?,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn issued_from_entity(model: IssuedModel) -> StoreResult<IssuedCoupon> {
    let status = CouponStatus::parse(&model.status)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown coupon status {:?}", model.status)))?;
    Ok(IssuedCoupon {
        id: model.id,
        code: model.code,
        user_id: model.user_id,
        business_id: model.business_id,
        review_id: model.review_id,
        template_id: model.template_id,
        terms: serde_json::from_value(model.terms)?,
        issued_at: model.issued_at.with_timezone(&Utc),
        valid_until: model.valid_until.with_timezone(&Utc),
        status,
        redeemed_at: model.redeemed_at.map(|dt| dt.with_timezone(&Utc)),
        redeemed_by: model.redeemed_by,
    })
}

fn promo_from_entity(model: PromoModel) -> StoreResult<PromotionalCoupon> {
    Ok(PromotionalCoupon {
        id: model.id,
        business_id: model.business_id,
        code: model.code,
        title: model.title,
        terms: serde_json::from_value(model.terms)?,
        usage_limit: model.usage_limit,
        usage_count: model.usage_count,
        is_active: model.is_active,
        expires_at: model.expires_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn event_from_entity(model: EventModel) -> StoreResult<RedemptionEvent> {
    let outcome = RedemptionOutcome::parse(&model.outcome)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown outcome {:?}", model.outcome)))?;
    let coupon_kind = match model.coupon_kind.as_deref() {
        None => None,
        Some(kind) => Some(
            CouponKind::parse(kind)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown coupon kind {kind:?}")))?,
        ),
    };
    Ok(RedemptionEvent {
        id: model.id,
        coupon_id: model.coupon_id,
        coupon_kind,
        scanner_business_id: model.scanner_business_id,
        outcome,
        created_at: model.created_at.with_timezone(&Utc),
    })
}
