#![allow(dead_code)]

use chrono::Utc;
use review_rewards_api::{
    config::AppConfig,
    models::{Business, CouponTemplate, Role, User},
    rewards::{
        GeoPoint, Reward, RewardTerms,
        geo::EARTH_RADIUS_M,
    },
    state::AppState,
    store::{BusinessStore, MemoryStore, TemplateStore, UserStore},
};
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret";

pub const SHOP: GeoPoint = GeoPoint {
    latitude: 26.1445,
    longitude: 91.7362,
};

/// A point `meters` due north of `origin`.
pub fn north_of(origin: GeoPoint, meters: f64) -> GeoPoint {
    GeoPoint::new(
        origin.latitude + (meters / EARTH_RADIUS_M).to_degrees(),
        origin.longitude,
    )
}

pub fn memory_state(store: &MemoryStore) -> AppState {
    AppState::from_store(AppConfig::in_memory(JWT_SECRET), store.clone())
}

pub async fn create_user(store: &MemoryStore, role: Role) -> User {
    store
        .insert_user(User {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", Uuid::new_v4()),
            password_hash: "unused".into(),
            role,
            created_at: Utc::now(),
        })
        .await
        .expect("insert user")
}

/// A business owner plus a 50 m business at `SHOP`.
pub async fn create_business(store: &MemoryStore) -> (User, Business) {
    let owner = create_user(store, Role::Business).await;
    let business = store
        .insert_business(Business {
            id: Uuid::new_v4(),
            owner_id: owner.id,
            name: "Brahmaputra Tea House".into(),
            latitude: SHOP.latitude,
            longitude: SHOP.longitude,
            radius_m: 50.0,
            is_active: true,
            created_at: Utc::now(),
        })
        .await
        .expect("insert business");
    (owner, business)
}

pub fn ten_percent() -> RewardTerms {
    RewardTerms {
        reward: Reward::Percentage {
            percent: 10,
            max_discount_amount: Some(10_000),
        },
        min_purchase_amount: None,
    }
}

pub async fn create_template(store: &MemoryStore, business_id: Uuid, terms: RewardTerms) {
    store
        .replace_template(CouponTemplate {
            id: Uuid::new_v4(),
            business_id,
            terms,
            is_active: true,
            created_at: Utc::now(),
        })
        .await
        .expect("insert template");
}
