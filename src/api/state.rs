use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::exchange::ExchangeApi;
use crate::registry::OrderRegistry;
use crate::router::SignalRouter;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<SignalRouter>,
    pub registry: Arc<OrderRegistry>,
    pub exchange: Arc<dyn ExchangeApi>,
    /// Tracked instrument, echoed in status responses
    pub symbol: String,
    /// Application start time
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        router: Arc<SignalRouter>,
        registry: Arc<OrderRegistry>,
        exchange: Arc<dyn ExchangeApi>,
        symbol: String,
    ) -> Self {
        Self {
            router,
            registry,
            exchange,
            symbol,
            started_at: Utc::now(),
        }
    }
}
