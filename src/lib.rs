pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod notify;
pub mod registry;
pub mod router;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::AppConfig;
pub use domain::{
    AlertType, OrderRole, OrderSide, OrderStatus, PositionState, Signal, SignalPayload,
    TrackedOrder,
};
pub use error::{FlareError, Result};
pub use exchange::{DeltaClient, ExchangeApi, OrderRequest, OrderSnapshot, PositionSnapshot};
pub use notify::{Alert, AlertLevel, Notifier};
pub use registry::OrderRegistry;
pub use router::SignalRouter;
pub use supervisor::{OrderSupervisor, SupervisorConfig};
