// ============================
// taskvault-backend/src/config.rs
// ============================
//! Configuration management.
//!
//! Settings are layered with `figment`: built-in defaults, then an optional
//! TOML file, then `TASKVAULT_*` environment variables (nested keys use `__`,
//! e.g. `TASKVAULT_RATE_LIMIT__BURST=10`).
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "taskvault.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "TASKVAULT_";

/// Secret used when nothing is configured. Refused in production.
pub const DEVELOPMENT_JWT_SECRET: &str = "taskvault-development-secret-do-not-deploy";

const MIN_JWT_SECRET_LEN: usize = 32;
/// Slowest refill accepted: one request every ~17 minutes.
pub const MIN_REQUESTS_PER_SECOND: f64 = 0.001;
/// Upper bound for every duration setting, in seconds (one year).
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// `development` or `production`
    pub environment: String,
    /// Log level used when `RUST_LOG` is unset
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub rate_limit: RateLimitSettings,
    pub activation: ActivationSettings,
    pub mail: MailSettings,
    pub password: PasswordSettings,
    pub cors: CorsSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// PostgreSQL connection settings. Without a DSN the server runs on the
/// in-memory store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub dsn: Option<String>,
    pub max_connections: u32,
    pub max_idle_time_secs: u64,
    /// Upper bound for every storage call, including optimistic updates
    pub query_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtSettings {
    pub secret: String,
    pub token_ttl_secs: u64,
}

/// Per-client token bucket parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub enabled: bool,
    /// Refill rate in tokens per second
    pub requests_per_second: f64,
    /// Bucket capacity
    pub burst: u32,
    /// Clients unseen for this long are forgotten
    pub idle_window_secs: u64,
    pub reap_interval_secs: u64,
    /// Read the client address from `X-Real-IP` (only behind a trusted proxy)
    pub trust_proxy_header: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationSettings {
    pub code_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    pub sender: String,
    pub max_attempts: u32,
}

/// scrypt cost parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordSettings {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsSettings {
    /// Exact origins, or `*` for any
    pub trusted_origins: Vec<String>,
}

/// Rejected configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid log level: {0}")]
    LogLevel(String),
    #[error("invalid environment: {0} (expected development or production)")]
    Environment(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("{0} must be at most {MAX_DURATION_SECS} seconds")]
    TooLong(&'static str),
    #[error("rate_limit.requests_per_second must be at least {MIN_REQUESTS_PER_SECOND}")]
    RateTooLow,
    #[error("jwt secret must be at least {MIN_JWT_SECRET_LEN} bytes")]
    WeakSecret,
    #[error("the development jwt secret cannot be used in production")]
    DevelopmentSecret,
    #[error("scrypt parameters are invalid: {0}")]
    Password(String),
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            environment: "development".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database: DatabaseSettings::default(),
            jwt: JwtSettings::default(),
            rate_limit: RateLimitSettings::default(),
            activation: ActivationSettings::default(),
            mail: MailSettings::default(),
            password: PasswordSettings::default(),
            cors: CorsSettings::default(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            dsn: None,
            max_connections: 25,
            max_idle_time_secs: 15 * 60,
            query_timeout_secs: 5,
        }
    }
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: DEVELOPMENT_JWT_SECRET.to_string(),
            token_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 2.0,
            burst: 4,
            idle_window_secs: 3 * 60,
            reap_interval_secs: 60,
            trust_proxy_header: false,
        }
    }
}

impl Default for ActivationSettings {
    fn default() -> Self {
        Self {
            code_ttl_secs: 60,
            sweep_interval_secs: 60,
        }
    }
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            sender: "no-reply@taskvault.local".to_string(),
            max_attempts: 3,
        }
    }
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            log_n: 15,
            r: 8,
            p: 1,
        }
    }
}

impl Settings {
    /// Provider chain: defaults, TOML file, environment.
    pub fn figment(path: Option<&Path>) -> Figment {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate settings.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let settings: Settings = Self::figment(path).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::LogLevel(self.log_level.clone()));
        }
        if self.environment != "development" && self.environment != "production" {
            return Err(ConfigError::Environment(self.environment.clone()));
        }
        if self.jwt.secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::WeakSecret);
        }
        if self.is_production() && self.jwt.secret == DEVELOPMENT_JWT_SECRET {
            return Err(ConfigError::DevelopmentSecret);
        }
        if self.jwt.token_ttl_secs == 0 {
            return Err(ConfigError::Zero("jwt.token_ttl_secs"));
        }
        if self.database.query_timeout_secs == 0 {
            return Err(ConfigError::Zero("database.query_timeout_secs"));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Zero("database.max_connections"));
        }
        let rate = self.rate_limit.requests_per_second;
        if rate.is_nan() || rate <= 0.0 {
            return Err(ConfigError::Zero("rate_limit.requests_per_second"));
        }
        if rate < MIN_REQUESTS_PER_SECOND {
            return Err(ConfigError::RateTooLow);
        }
        if self.rate_limit.burst == 0 {
            return Err(ConfigError::Zero("rate_limit.burst"));
        }
        if self.rate_limit.idle_window_secs == 0 {
            return Err(ConfigError::Zero("rate_limit.idle_window_secs"));
        }
        if self.rate_limit.reap_interval_secs == 0 {
            return Err(ConfigError::Zero("rate_limit.reap_interval_secs"));
        }
        if self.activation.code_ttl_secs == 0 {
            return Err(ConfigError::Zero("activation.code_ttl_secs"));
        }
        if self.activation.sweep_interval_secs == 0 {
            return Err(ConfigError::Zero("activation.sweep_interval_secs"));
        }
        for (key, secs) in [
            ("jwt.token_ttl_secs", self.jwt.token_ttl_secs),
            ("database.query_timeout_secs", self.database.query_timeout_secs),
            ("database.max_idle_time_secs", self.database.max_idle_time_secs),
            ("rate_limit.idle_window_secs", self.rate_limit.idle_window_secs),
            ("rate_limit.reap_interval_secs", self.rate_limit.reap_interval_secs),
            ("activation.code_ttl_secs", self.activation.code_ttl_secs),
            ("activation.sweep_interval_secs", self.activation.sweep_interval_secs),
        ] {
            if secs > MAX_DURATION_SECS {
                return Err(ConfigError::TooLong(key));
            }
        }
        if self.mail.max_attempts == 0 {
            return Err(ConfigError::Zero("mail.max_attempts"));
        }
        scrypt::Params::new(
            self.password.log_n,
            self.password.r,
            self.password.p,
            scrypt::Params::RECOMMENDED_LEN,
        )
        .map_err(|e| ConfigError::Password(e.to_string()))?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.database.query_timeout_secs)
    }
}

#[cfg(test)]
mod config_tests;
