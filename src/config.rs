use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::Duration;
use dotenvy::dotenv;

/// Business knobs of the desk itself.
#[derive(Debug, Clone)]
pub struct DeskSettings {
    pub session_timeout: Duration,
    /// Final part of the session window in which activity no longer counts.
    pub session_warning: Duration,
    /// How recent a sign-in must be to open the reset ceremony.
    pub reset_freshness: Duration,
    pub reset_attempts_per_hour: usize,
    pub max_failed_logins: u32,
}

impl Default for DeskSettings {
    fn default() -> Self {
        Self {
            session_timeout: Duration::seconds(600),
            session_warning: Duration::seconds(120),
            reset_freshness: Duration::seconds(600),
            reset_attempts_per_hour: 2,
            max_failed_logins: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: String,
    pub jwt_secret: String,
    pub access_token_ttl: usize,
    pub api_prefix: String,

    // Durable store, first match wins
    pub database_url: Option<String>,
    pub sync_base_url: Option<String>,
    pub fallback_dir: PathBuf,
    /// Per-request limit for the hosted sync API.
    pub sync_timeout_secs: u64,

    pub bootstrap_admin_name: Option<String>,
    pub bootstrap_admin_pin: Option<String>,

    pub advisory_url: Option<String>,
    pub advisory_api_key: Option<String>,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_protected_per_min: u32,

    pub desk: DeskSettings,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        None => Ok(default),
    }
}

fn seconds(key: &str, default: i64) -> Result<Duration> {
    parsed(key, default).map(Duration::seconds)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let defaults = DeskSettings::default();
        let desk = DeskSettings {
            session_timeout: seconds("SESSION_TIMEOUT_SECS", defaults.session_timeout.num_seconds())?,
            session_warning: seconds("SESSION_WARNING_SECS", defaults.session_warning.num_seconds())?,
            reset_freshness: seconds("RESET_FRESHNESS_SECS", defaults.reset_freshness.num_seconds())?,
            reset_attempts_per_hour: parsed(
                "RESET_ATTEMPTS_PER_HOUR",
                defaults.reset_attempts_per_hour,
            )?,
            max_failed_logins: parsed("MAX_FAILED_LOGINS", defaults.max_failed_logins)?,
        };

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parsed("ACCESS_TOKEN_TTL", 900)?, // default 15 min
            api_prefix: optional("API_PREFIX").unwrap_or_else(|| "/api".to_string()),

            database_url: optional("DATABASE_URL"),
            sync_base_url: optional("SYNC_BASE_URL"),
            fallback_dir: optional("FALLBACK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            sync_timeout_secs: parsed("SYNC_TIMEOUT_SECS", 8)?,

            bootstrap_admin_name: optional("BOOTSTRAP_ADMIN_NAME"),
            bootstrap_admin_pin: optional("BOOTSTRAP_ADMIN_PIN"),

            advisory_url: optional("ADVISORY_URL"),
            advisory_api_key: optional("ADVISORY_API_KEY"),

            rate_login_per_min: parsed("RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: parsed("RATE_REGISTER_PER_MIN", 30)?,
            rate_protected_per_min: parsed("RATE_PROTECTED_PER_MIN", 1000)?,

            desk,
        })
    }
}
