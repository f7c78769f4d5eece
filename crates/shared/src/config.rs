//! Application configuration management.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Clearing and settlement parameters.
    #[serde(default)]
    pub clearing: ClearingConfig,
    /// External financial-account synchronization.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Clearing configuration.
///
/// Fee rates are fractions: `0.006` means 0.6% of the gross amount.
#[derive(Debug, Clone, Deserialize)]
pub struct ClearingConfig {
    /// Fee rate applied when a merchant has no account yet.
    #[serde(default = "default_fee_rate")]
    pub default_fee_rate: Decimal,
    /// Currency assigned to newly created ledger accounts.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Owner of the channel-receivable account.
    #[serde(default = "default_channel_entity")]
    pub channel_entity_id: String,
    /// Owner of the platform fee-income account.
    #[serde(default = "default_platform_entity")]
    pub platform_entity_id: String,
    /// How long a posting waits for an account lock before giving up.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_fee_rate() -> Decimal {
    Decimal::new(6, 3)
}

fn default_currency() -> String {
    "CNY".to_string()
}

fn default_channel_entity() -> String {
    "CHANNEL_GLOBAL".to_string()
}

fn default_platform_entity() -> String {
    "PLATFORM_MAIN".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    2_000
}

impl Default for ClearingConfig {
    fn default() -> Self {
        Self {
            default_fee_rate: default_fee_rate(),
            currency: default_currency(),
            channel_entity_id: default_channel_entity(),
            platform_entity_id: default_platform_entity(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Configuration for the best-effort external sync queue.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Whether deposit notifications are dispatched at all.
    #[serde(default)]
    pub enabled: bool,
    /// Bounded queue size; notifications beyond it are dropped with a warning.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Attempts per notification, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff before the first retry; doubled after each failure.
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
}

fn default_queue_capacity() -> usize {
    1_024
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_backoff_ms() -> u64 {
    200
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            queue_capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("SETTLA").separator("__"))
            .build()?;

        let app: Self = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    /// Checks cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` describing the first violation.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let rate = self.clearing.default_fee_rate;
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(config::ConfigError::Message(format!(
                "clearing.default_fee_rate must be a fraction in [0, 1], got {rate}"
            )));
        }
        if self.sync.max_attempts == 0 {
            return Err(config::ConfigError::Message(
                "sync.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.sync.queue_capacity == 0 {
            return Err(config::ConfigError::Message(
                "sync.queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
