use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use review_rewards_api::{
    config::{AppConfig, StoreBackend},
    db::{create_pool, run_migrations},
    routes::build_app,
    state::AppState,
    store::{MemoryStore, PgStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,review_rewards_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));

    let state = match (config.store_backend, config.database_url.clone()) {
        (StoreBackend::Postgres, Some(database_url)) => {
            let pool = create_pool(&database_url, config.max_connections).await?;
            run_migrations(&pool).await?;
            AppState::from_store(config, PgStore::new(pool))
        }
        (StoreBackend::Postgres, None) => anyhow::bail!("DATABASE_URL is not set"),
        (StoreBackend::Memory, _) => {
            tracing::warn!("using the in-memory store, data is lost on restart");
            AppState::from_store(config, MemoryStore::new())
        }
    };

    let app = build_app(state);

    tracing::info!("listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    Ok(())
}
