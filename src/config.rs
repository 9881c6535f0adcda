use std::{env, ops::RangeInclusive, str::FromStr, time::Duration};

use anyhow::{Context, bail};

use crate::{rewards::gate::DEFAULT_REVIEW_COOLDOWN_DAYS, store::WritePolicy};

/// Accepted range for `REVIEW_COOLDOWN_DAYS`. Zero would disable the
/// duplicate-review rule.
pub const REVIEW_COOLDOWN_DAYS_RANGE: RangeInclusive<i64> = 1..=3650;

/// Accepted range for `STORE_WRITE_ATTEMPTS`.
pub const STORE_WRITE_ATTEMPTS_RANGE: RangeInclusive<u8> = 1..=10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => bail!("unknown STORE_BACKEND {other:?}, expected postgres or memory"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub jwt_secret: String,
    pub max_connections: u32,
    pub review_cooldown_days: i64,
    pub write_policy: WritePolicy,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store_backend = match env::var("STORE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => StoreBackend::Postgres,
        };
        let database_url = env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when STORE_BACKEND is postgres");
        }

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("APP_PORT", 3000)?;
        let max_connections = parse_or("DB_MAX_CONNECTIONS", 10)?;
        let review_cooldown_days = parse_or("REVIEW_COOLDOWN_DAYS", DEFAULT_REVIEW_COOLDOWN_DAYS)?;

        let defaults = WritePolicy::default();
        let write_policy = WritePolicy {
            timeout: Duration::from_millis(parse_or(
                "STORE_WRITE_TIMEOUT_MS",
                defaults.timeout.as_millis() as u64,
            )?),
            max_attempts: parse_or("STORE_WRITE_ATTEMPTS", defaults.max_attempts)?,
            ..defaults
        };

        let config = Self {
            database_url,
            host,
            port,
            store_backend,
            jwt_secret,
            max_connections,
            review_cooldown_days,
            write_policy,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would switch off a policy or overflow later.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !REVIEW_COOLDOWN_DAYS_RANGE.contains(&self.review_cooldown_days) {
            bail!(
                "REVIEW_COOLDOWN_DAYS must be between {} and {}, got {}",
                REVIEW_COOLDOWN_DAYS_RANGE.start(),
                REVIEW_COOLDOWN_DAYS_RANGE.end(),
                self.review_cooldown_days
            );
        }
        if !STORE_WRITE_ATTEMPTS_RANGE.contains(&self.write_policy.max_attempts) {
            bail!(
                "STORE_WRITE_ATTEMPTS must be between {} and {}, got {}",
                STORE_WRITE_ATTEMPTS_RANGE.start(),
                STORE_WRITE_ATTEMPTS_RANGE.end(),
                self.write_policy.max_attempts
            );
        }
        if self.write_policy.timeout.is_zero() {
            bail!("STORE_WRITE_TIMEOUT_MS must be greater than 0");
        }
        Ok(())
    }

    /// Configuration for tests and local runs without a database.
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: None,
            host: "127.0.0.1".to_string(),
            port: 3000,
            store_backend: StoreBackend::Memory,
            jwt_secret: jwt_secret.into(),
            max_connections: 1,
            review_cooldown_days: DEFAULT_REVIEW_COOLDOWN_DAYS,
            write_policy: WritePolicy::default(),
        }
    }
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value {raw:?}")),
        Err(_) => Ok(default),
    }
}
