//! Bot configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `TELEGRAM_BOT_TOKEN` - Bot API token issued by `@BotFather`
//! - `BOT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `BOT_HOST` - Bind address (default: 0.0.0.0)
//! - `BOT_PORT` - Listen port (default: 8443)
//! - `WEBHOOK_URL` - Public base URL; updates arrive at `/telegram/webhook`
//! - `WEBHOOK_SECRET` - Value Telegram sends in `X-Telegram-Bot-Api-Secret-Token`
//! - `ADMIN_CHAT_ID` - Comma separated staff chat ids that always receive notifications
//! - `MANAGER_URL` - Link behind the "manager" button (default: <https://t.me/Krash_order_Bot>)
//! - `BOT_UTC_OFFSET_HOURS` - Business time zone offset from UTC (default: 3)
//! - `BOT_RUN_MIGRATIONS` - Apply pending migrations on startup (default: false)
//! - `TELEGRAM_API_URL` - Bot API base URL (default: <https://api.telegram.org>)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 1.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::LazyLock;

use chrono::FixedOffset;
use krash_order_core::ChatId;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const MIN_WEBHOOK_SECRET_LENGTH: usize = 16;
const DEFAULT_MANAGER_URL: &str = "https://t.me/Krash_order_Bot";
const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Path the webhook route is mounted on.
pub const WEBHOOK_PATH: &str = "/telegram/webhook";

/// `<bot id>:<secret part>` as issued by `@BotFather`.
static BOT_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5,}:[A-Za-z0-9_-]{30,}$").expect("Invalid regex"));

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Bot application configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the webhook server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Telegram Bot API configuration
    pub telegram: TelegramConfig,
    /// Staff chats configured at deploy time
    pub admin_chat_ids: Vec<ChatId>,
    /// Link behind the "manager" button
    pub manager_url: String,
    /// Business-local time zone
    pub utc_offset: FixedOffset,
    /// Apply migrations at startup
    pub run_migrations: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Telegram Bot API configuration.
///
/// Implements `Debug` manually to redact the token and webhook secret.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token
    pub bot_token: SecretString,
    /// Bot API base URL
    pub api_url: String,
    /// Public base URL for webhook delivery
    pub webhook_url: Option<String>,
    /// Shared secret Telegram echoes back on every webhook call
    pub webhook_secret: Option<SecretString>,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .field("webhook_url", &self.webhook_url)
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl TelegramConfig {
    /// Load Telegram configuration from environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the token is missing or malformed, or if the
    /// webhook secret is weak.
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = get_required_env("TELEGRAM_BOT_TOKEN")?;
        validate_bot_token(&token, "TELEGRAM_BOT_TOKEN")?;

        let webhook_secret = match get_optional_env("WEBHOOK_SECRET") {
            Some(secret) => {
                validate_webhook_secret(&secret, "WEBHOOK_SECRET")?;
                Some(SecretString::from(secret))
            }
            None => None,
        };

        Ok(Self {
            bot_token: SecretString::from(token),
            api_url: get_env_or_default("TELEGRAM_API_URL", DEFAULT_TELEGRAM_API_URL),
            webhook_url: get_optional_env("WEBHOOK_URL")
                .map(|raw| validate_url(&raw, "WEBHOOK_URL", true))
                .transpose()?,
            webhook_secret,
        })
    }

    /// Full URL Telegram should deliver updates to, if a base URL is set.
    #[must_use]
    pub fn webhook_endpoint(&self) -> Option<String> {
        self.webhook_url
            .as_deref()
            .map(|base| format!("{}{WEBHOOK_PATH}", base.trim_end_matches('/')))
    }
}

impl BotConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = database_url_from_env()?;
        let host = get_env_or_default("BOT_HOST", "0.0.0.0")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("BOT_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("BOT_PORT", "8443")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("BOT_PORT".to_string(), e.to_string()))?;

        let telegram = TelegramConfig::from_env()?;
        let admin_chat_ids = get_optional_env("ADMIN_CHAT_ID")
            .map_or_else(|| Ok(Vec::new()), |raw| parse_chat_ids(&raw, "ADMIN_CHAT_ID"))?;
        let utc_offset = utc_offset_from_env()?;
        let run_migrations = get_optional_env("BOT_RUN_MIGRATIONS")
            .is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes"));

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            host,
            port,
            telegram,
            admin_chat_ids,
            manager_url: validate_url(
                &get_env_or_default("MANAGER_URL", DEFAULT_MANAGER_URL),
                "MANAGER_URL",
                false,
            )?,
            utc_offset,
            run_migrations,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Database URL from `BOT_DATABASE_URL`, falling back to `DATABASE_URL`.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither is set.
pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
    get_database_url("BOT_DATABASE_URL")
}

/// Business time zone from `BOT_UTC_OFFSET_HOURS` (default: 3).
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for a non-numeric or out of range offset.
pub fn utc_offset_from_env() -> Result<FixedOffset, ConfigError> {
    parse_utc_offset(
        &get_env_or_default("BOT_UTC_OFFSET_HOURS", "3"),
        "BOT_UTC_OFFSET_HOURS",
    )
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a comma separated list of chat ids.
fn parse_chat_ids(raw: &str, var_name: &str) -> Result<Vec<ChatId>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<ChatId>().map_err(|e| {
                ConfigError::InvalidEnvVar(var_name.to_string(), format!("'{part}': {e}"))
            })
        })
        .collect()
}

/// Check that `raw` is an absolute http(s) URL; Telegram only delivers
/// webhooks over https.
fn validate_url(raw: &str, var_name: &str, require_https: bool) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    let allowed = match parsed.scheme() {
        "https" => true,
        "http" => !require_https,
        _ => false,
    };
    if !allowed {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("unsupported scheme '{}'", parsed.scheme()),
        ));
    }
    Ok(raw.trim().to_string())
}

/// Parse a whole-hour UTC offset in `-12..=14`.
fn parse_utc_offset(raw: &str, var_name: &str) -> Result<FixedOffset, ConfigError> {
    let hours = raw
        .trim()
        .parse::<i32>()
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    if !(-12..=14).contains(&hours) {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("offset {hours} is outside -12..=14"),
        ));
    }
    FixedOffset::east_opt(hours * 3600).ok_or_else(|| {
        ConfigError::InvalidEnvVar(var_name.to_string(), format!("invalid offset {hours}"))
    })
}

/// Reject placeholder or malformed bot tokens.
fn validate_bot_token(token: &str, var_name: &str) -> Result<(), ConfigError> {
    check_placeholder(token, var_name)?;
    if !BOT_TOKEN_RE.is_match(token.trim()) {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            "expected '<bot id>:<token>' as issued by BotFather".to_string(),
        ));
    }
    Ok(())
}

/// Telegram allows `A-Z`, `a-z`, `0-9`, `_` and `-`, 1-256 characters.
fn validate_webhook_secret(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    if secret.len() > 256
        || !secret
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            "only A-Z, a-z, 0-9, '_' and '-' are allowed, up to 256 characters".to_string(),
        ));
    }
    if secret.len() < MIN_WEBHOOK_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {MIN_WEBHOOK_SECRET_LENGTH} characters (got {})",
                secret.len()
            ),
        ));
    }
    validate_secret_strength(secret, var_name)
}

fn check_placeholder(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    check_placeholder(secret, var_name)?;

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Compare a presented secret against the configured one in constant time.
#[must_use]
pub fn secret_matches(expected: &SecretString, presented: &str) -> bool {
    crate::telegram::constant_time_compare(expected.expose_secret(), presented)
}
