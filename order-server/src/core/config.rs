use rust_decimal::Decimal;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use crate::auth::JwtConfig;
use crate::core::ServerError;
use crate::orders::{PaymentRule, StatusRule, TransitionPolicy};
use crate::realtime::RoomAccessMode;

/// Server configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | ./data | holds `orders.redb` |
/// | HTTP_PORT | 5000 | listen port |
/// | ENVIRONMENT | development | development / staging / production |
/// | STORAGE_TIMEOUT_MS | 5000 | bound on each Order Store call |
/// | RENDER_TIMEOUT_MS | 10000 | bound on bill PDF rendering |
/// | SUBSCRIBER_BUFFER | 64 | per-connection outbound queue |
/// | ORDER_TRANSITIONS | permissive | `permissive`, `forward_only` or `a:b,c:d` |
/// | PAYMENT_TRANSITIONS | lenient | `lenient` or `strict` |
/// | ROOM_ACCESS | open | `open` or `staff_token` |
/// | DIRECTORY_SEED | - | restaurants/tables/menu items JSON |
/// | TAX_RATE_PERCENT | 5 | bill tax rate |
/// | JWT_SECRET | generated outside production | token secret (>= 32 chars) |
/// | JWT_ISSUER / JWT_AUDIENCE | order-server / order-clients | expected claims |
/// | JWT_EXPIRATION_MINUTES | 1440 | lifetime of generated tokens |
///
/// Unparseable values fall back to the default with a warning. Logging is
/// configured separately, before this is loaded (see
/// [`crate::utils::logger::init_logger_from_env`]).
///
/// # Example
///
/// ```ignore
/// WORK_DIR=/srv/orders HTTP_PORT=8080 ORDER_TRANSITIONS=forward_only cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: String,
    pub http_port: u16,
    /// development | staging | production
    pub environment: String,
    pub jwt: JwtConfig,
    pub storage_timeout_ms: u64,
    pub render_timeout_ms: u64,
    pub subscriber_buffer: usize,
    pub status_rule: StatusRule,
    pub payment_rule: PaymentRule,
    pub room_access: RoomAccessMode,
    pub directory_seed: Option<String>,
    pub tax_rate_percent: Decimal,
}

/// Read and parse an env var, warning and falling back on bad input
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            tracing::warn!(key, value = %raw, error = %e, "Invalid config value, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from the environment
    ///
    /// Fails only when the JWT secret is unusable in production.
    pub fn from_env() -> Result<Self, ServerError> {
        let environment = env_opt("ENVIRONMENT").unwrap_or_else(|| "development".into());
        let jwt = JwtConfig::from_env(environment == "production")?;

        Ok(Self {
            work_dir: env_opt("WORK_DIR").unwrap_or_else(|| "./data".into()),
            http_port: env_or("HTTP_PORT", 5000),
            environment,
            jwt,
            storage_timeout_ms: env_or("STORAGE_TIMEOUT_MS", 5000),
            render_timeout_ms: env_or("RENDER_TIMEOUT_MS", 10_000),
            subscriber_buffer: env_or("SUBSCRIBER_BUFFER", 64),
            status_rule: env_or("ORDER_TRANSITIONS", StatusRule::Permissive),
            payment_rule: env_or("PAYMENT_TRANSITIONS", PaymentRule::Lenient),
            room_access: env_or("ROOM_ACCESS", RoomAccessMode::Open),
            directory_seed: env_opt("DIRECTORY_SEED"),
            tax_rate_percent: env_or("TAX_RATE_PERCENT", Decimal::from(5)),
        })
    }

    /// Environment-independent configuration for tests
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            work_dir: "./data".into(),
            http_port: 0,
            environment: "test".into(),
            jwt: JwtConfig::with_secret(jwt_secret),
            storage_timeout_ms: 5000,
            render_timeout_ms: 10_000,
            subscriber_buffer: 64,
            status_rule: StatusRule::Permissive,
            payment_rule: PaymentRule::Lenient,
            room_access: RoomAccessMode::Open,
            directory_seed: None,
            tax_rate_percent: Decimal::from(5),
        }
    }

    pub fn transition_policy(&self) -> TransitionPolicy {
        TransitionPolicy {
            status: self.status_rule.clone(),
            payment: self.payment_rule,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("orders.redb")
    }

    pub fn storage_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.storage_timeout_ms)
    }

    pub fn render_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.render_timeout_ms)
    }
}
