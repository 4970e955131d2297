use crate::core::{AppError, Currency, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

pub mod database;
pub mod server;

pub use database::DatabaseConfig;
pub use server::ServerConfig;

/// Upper bound on the gateway HTTP timeout
pub const MAX_GATEWAY_TIMEOUT_SECS: u64 = 15;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    /// Absent when running on the in-memory store
    pub database: Option<DatabaseConfig>,
    pub server: ServerConfig,
    pub cinetpay: CinetPayConfig,
    pub payments: PaymentsConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub log_level: String,
    pub log_format: LogFormat,
    pub storage_backend: StorageBackend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Mysql,
    Memory,
}

#[derive(Clone, Deserialize)]
pub struct CinetPayConfig {
    pub api_key: String,
    pub site_id: String,
    pub secret_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentsConfig {
    pub currency: Currency,
    pub notify_url: String,
    pub return_url: String,
    pub channels: String,
    /// Allows `isSimulation` initiations; never enable in production
    pub simulation_enabled: bool,
}

#[derive(Clone, Deserialize)]
pub struct SecurityConfig {
    pub auth_token_secret: String,
    pub webhook_rate_limit_per_minute: u32,
    pub cors_allowed_origin: Option<String>,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(AppError::Configuration(format!("Invalid LOG_FORMAT '{}'", other))),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mysql" => Ok(StorageBackend::Mysql),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(AppError::Configuration(format!(
                "Invalid STORAGE_BACKEND '{}'",
                other
            ))),
        }
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for CinetPayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CinetPayConfig")
            .field("site_id", &self.site_id)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field(
                "webhook_rate_limit_per_minute",
                &self.webhook_rate_limit_per_minute,
            )
            .field("cors_allowed_origin", &self.cors_allowed_origin)
            .finish_non_exhaustive()
    }
}

/// Read a required variable
pub(crate) fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| AppError::Configuration(format!("{} not set", key)))
}

/// Read and parse a variable, falling back to `default` when unset
pub(crate) fn parsed_or<T: FromStr>(key: &str, default: &str) -> Result<T> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| AppError::Configuration(format!("Invalid {}", key)))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let storage_backend: StorageBackend = parsed_or("STORAGE_BACKEND", "mysql")?;
        let database = match storage_backend {
            StorageBackend::Mysql => Some(DatabaseConfig::from_env()?),
            StorageBackend::Memory => None,
        };

        let config = Config {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                log_format: parsed_or("LOG_FORMAT", "pretty")?,
                storage_backend,
            },
            database,
            server: ServerConfig::from_env()?,
            cinetpay: CinetPayConfig {
                api_key: required("CINETPAY_API_KEY")?,
                site_id: required("CINETPAY_SITE_ID")?,
                secret_key: required("CINETPAY_SECRET_KEY")?,
                base_url: env::var("CINETPAY_BASE_URL")
                    .unwrap_or_else(|_| "https://api-checkout.cinetpay.com".to_string()),
                timeout_secs: parsed_or("CINETPAY_TIMEOUT_SECS", "15")?,
            },
            payments: PaymentsConfig {
                currency: parsed_or("PAYMENT_CURRENCY", "XOF")?,
                notify_url: required("PAYMENT_NOTIFY_URL")?,
                return_url: required("PAYMENT_RETURN_URL")?,
                channels: env::var("PAYMENT_CHANNELS").unwrap_or_else(|_| "ALL".to_string()),
                simulation_enabled: parsed_or("PAYMENT_SIMULATION_ENABLED", "false")?,
            },
            security: SecurityConfig {
                auth_token_secret: required("AUTH_TOKEN_SECRET")?,
                webhook_rate_limit_per_minute: parsed_or("WEBHOOK_RATE_LIMIT_PER_MINUTE", "600")?,
                cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN").ok(),
            },
        };

        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.app.env.eq_ignore_ascii_case("production")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.cinetpay.timeout_secs == 0 || self.cinetpay.timeout_secs > MAX_GATEWAY_TIMEOUT_SECS
        {
            return Err(AppError::Configuration(format!(
                "CINETPAY_TIMEOUT_SECS must be between 1 and {}",
                MAX_GATEWAY_TIMEOUT_SECS
            )));
        }

        if self.security.webhook_rate_limit_per_minute == 0 {
            return Err(AppError::Configuration(
                "Rate limit must be greater than 0".to_string(),
            ));
        }

        if self.security.auth_token_secret.len() < 32 {
            return Err(AppError::Configuration(
                "AUTH_TOKEN_SECRET must be at least 32 bytes".to_string(),
            ));
        }

        if self.is_production() && self.payments.simulation_enabled {
            return Err(AppError::Configuration(
                "Payment simulation cannot be enabled in production".to_string(),
            ));
        }

        if self.is_production() && self.app.storage_backend == StorageBackend::Memory {
            return Err(AppError::Configuration(
                "The in-memory store cannot be used in production".to_string(),
            ));
        }

        Ok(())
    }
}
