use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use review_rewards_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    rewards::{Reward, RewardTerms},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let database_url = config
        .database_url
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?;

    let pool = create_pool(&database_url, config.max_connections).await?;
    // Ensure migrations are applied.
    run_migrations(&pool).await?;

    let owner_id = ensure_user(&pool, "owner@example.com", "owner1234", "business").await?;
    let customer_id = ensure_user(&pool, "customer@example.com", "customer1234", "user").await?;
    let business_id = ensure_business(&pool, owner_id).await?;
    seed_template(&pool, business_id).await?;
    seed_promotion(&pool, business_id).await?;

    println!(
        "Seed completed. Owner ID: {owner_id}, Customer ID: {customer_id}, Business ID: {business_id}"
    );
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn ensure_business(pool: &sqlx::PgPool, owner_id: Uuid) -> anyhow::Result<Uuid> {
    let (business_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO businesses (id, owner_id, name, latitude, longitude, radius_m)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (owner_id) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner_id)
    .bind("Brahmaputra Tea House")
    .bind(26.1445_f64)
    .bind(91.7362_f64)
    .bind(50.0_f64)
    .fetch_one(pool)
    .await?;

    println!("Ensured business {business_id}");
    Ok(business_id)
}

async fn seed_template(pool: &sqlx::PgPool, business_id: Uuid) -> anyhow::Result<()> {
    let terms = RewardTerms {
        reward: Reward::Percentage {
            percent: 15,
            max_discount_amount: Some(20_000),
        },
        min_purchase_amount: Some(50_000),
    };

    sqlx::query(
        r#"
        INSERT INTO coupon_templates (id, business_id, terms, is_active, is_current)
        SELECT $1, $2, $3, TRUE, TRUE
        WHERE NOT EXISTS (
            SELECT 1 FROM coupon_templates WHERE business_id = $2 AND is_current
        )
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(business_id)
    .bind(serde_json::to_value(&terms)?)
    .execute(pool)
    .await?;

    println!("Seeded coupon template");
    Ok(())
}

async fn seed_promotion(pool: &sqlx::PgPool, business_id: Uuid) -> anyhow::Result<()> {
    let terms = RewardTerms {
        reward: Reward::FreeDrink {
            item: "Masala chai".into(),
        },
        min_purchase_amount: None,
    };

    sqlx::query(
        r#"
        INSERT INTO promotional_coupons (id, business_id, code, title, terms, usage_limit)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (business_id, code) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(business_id)
    .bind("WELCOME-CHAI")
    .bind("Free chai for first-time visitors")
    .bind(serde_json::to_value(&terms)?)
    .bind(100_i32)
    .execute(pool)
    .await?;

    println!("Seeded promotional coupon");
    Ok(())
}
