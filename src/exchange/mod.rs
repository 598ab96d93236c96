//! Exchange access: request signing, wire types and the signed REST client.

mod delta;
mod sign;
mod types;

pub use delta::DeltaClient;
pub use sign::RequestSigner;
pub use types::{OrderRequest, OrderSnapshot, PlacedOrder, PositionSnapshot};

use async_trait::async_trait;

use crate::domain::OrderId;
use crate::error::Result;

/// The operations the router and supervisor need from an exchange.
/// `DeltaClient` is the production implementation; tests script their own.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Place an order and return its exchange-assigned id
    async fn place_order(&self, request: &OrderRequest) -> Result<PlacedOrder>;

    /// Fetch the current status of one order
    async fn order_status(&self, order_id: OrderId) -> Result<OrderSnapshot>;

    /// Cancel one order; `Ok(false)` means the exchange refused (already
    /// terminal) without erroring
    async fn cancel_order(&self, order_id: OrderId) -> Result<bool>;

    /// List open orders for the tracked product
    async fn open_orders(&self) -> Result<Vec<OrderSnapshot>>;

    /// Fetch the current position for the tracked product, if any
    async fn position(&self) -> Result<Option<PositionSnapshot>>;
}
