use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub exchange: ExchangeConfig,
    pub trading: TradingConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// REST API endpoint, e.g. "https://api.india.delta.exchange"
    pub base_url: String,
    /// API key (FLARE_EXCHANGE__API_KEY)
    pub api_key: String,
    /// API secret (FLARE_EXCHANGE__API_SECRET)
    pub api_secret: String,
    /// Numeric product id of the tracked contract
    pub product_id: i64,
    /// Symbol of the tracked contract, e.g. "BTCUSD"
    pub symbol: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Retry attempts after the initial request (transport/5xx only)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fixed delay between retries in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

/// Order type used for entries. The stop-loss leg is always a reduce-only
/// stop-market order; only the entry leg is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOrderType {
    /// Resting limit order at the signal's reference price
    Limit,
    /// Market order triggered at the signal's trigger price
    StopMarket,
}

impl Default for EntryOrderType {
    fn default() -> Self {
        Self::Limit
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Order size in base units when the alert does not carry one
    pub default_lot_size: Decimal,
    /// Base units per contract (0.001 => 1 BTC = 1000 contracts)
    #[serde(default = "default_contract_size")]
    pub contract_size: Decimal,
    #[serde(default)]
    pub entry_order_type: EntryOrderType,
}

fn default_contract_size() -> Decimal {
    Decimal::new(1, 3) // 0.001
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Seconds between order status polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Seconds a pending order may live before auto-cancellation
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
    /// Seconds between partial-fill progress notifications
    #[serde(default = "default_progress_interval_secs")]
    pub progress_interval_secs: u64,
    /// Seconds between still-pending heartbeat notifications
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_max_wait_secs() -> u64 {
    5400 // 90 minutes
}

fn default_progress_interval_secs() -> u64 {
    300
}

fn default_heartbeat_interval_secs() -> u64 {
    900
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_wait_secs: default_max_wait_secs(),
            progress_interval_secs: default_progress_interval_secs(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
        }
    }
}

impl ExecutionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TelegramConfig {
    /// Bot token; notifications are disabled when unset
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Target chat id
    #[serde(default)]
    pub chat_id: Option<String>,
}

impl TelegramConfig {
    pub fn is_enabled(&self) -> bool {
        self.bot_token.is_some() && self.chat_id.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g. config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("FLARE_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (FLARE_EXCHANGE__API_KEY, etc.)
            .add_source(
                Environment::with_prefix("FLARE")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.exchange.base_url.is_empty() {
            errors.push("exchange.base_url must be set".to_string());
        }

        if self.exchange.api_key.is_empty() || self.exchange.api_secret.is_empty() {
            errors.push("exchange.api_key and exchange.api_secret must be set".to_string());
        }

        if self.trading.default_lot_size <= Decimal::ZERO {
            errors.push("trading.default_lot_size must be positive".to_string());
        }

        if self.trading.contract_size <= Decimal::ZERO {
            errors.push("trading.contract_size must be positive".to_string());
        }

        if self.execution.poll_interval_secs == 0 {
            errors.push("execution.poll_interval_secs must be at least 1".to_string());
        }

        if self.execution.max_wait_secs <= self.execution.poll_interval_secs {
            errors.push("execution.max_wait_secs must exceed the poll interval".to_string());
        }

        if self.telegram.bot_token.is_some() != self.telegram.chat_id.is_some() {
            errors.push(
                "telegram.bot_token and telegram.chat_id must be set together".to_string(),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
