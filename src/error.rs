use thiserror::Error;

/// Main error type for the trading bot
#[derive(Error, Debug)]
pub enum FlareError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Exchange-side errors: non-2xx status or a failed response envelope,
    // raw body preserved for the operator
    #[error("Exchange error (status {status}): {body}")]
    Exchange { status: u16, body: String },

    // Authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),

    // Crypto/signing errors
    #[error("Signature error: {0}")]
    Signature(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Order execution errors
    #[error("Order submission failed: {0}")]
    OrderSubmission(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for FlareError
pub type Result<T> = std::result::Result<T, FlareError>;

impl FlareError {
    /// Whether the exchange client may retry the request that produced
    /// this error. Transport failures and 5xx responses are transient;
    /// everything else (4xx, auth, validation) is terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            FlareError::Http(e) => !e.is_status() || e.status().map_or(true, |s| s.is_server_error()),
            FlareError::Exchange { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether this error came back as an authentication/signature
    /// rejection from the exchange.
    pub fn is_auth(&self) -> bool {
        match self {
            FlareError::Auth(_) | FlareError::Signature(_) => true,
            FlareError::Exchange { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}
