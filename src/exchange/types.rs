use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::{OrderId, OrderSide, OrderStatus};

/// Outbound order payload in the exchange's wire shape. Prices travel as
/// strings and `reduce_only` as the string "true", matching what the
/// exchange accepts.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub product_id: i64,
    pub size: i64,
    pub side: OrderSide,
    pub order_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_order_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_trigger_method: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduce_only: Option<&'static str>,
}

impl OrderRequest {
    /// Resting limit order opening a position
    pub fn limit_entry(product_id: i64, side: OrderSide, size: i64, price: Decimal) -> Self {
        Self {
            product_id,
            size,
            side,
            order_type: "limit_order",
            limit_price: Some(price.normalize().to_string()),
            stop_order_type: None,
            stop_price: None,
            stop_trigger_method: None,
            reduce_only: None,
        }
    }

    /// Market order triggered at `trigger`, opening a position
    pub fn stop_market_entry(
        product_id: i64,
        side: OrderSide,
        size: i64,
        trigger: Decimal,
    ) -> Self {
        Self {
            product_id,
            size,
            side,
            order_type: "market_order",
            limit_price: None,
            stop_order_type: Some("stop_loss_order"),
            stop_price: Some(trigger.normalize().to_string()),
            stop_trigger_method: Some("mark_price"),
            reduce_only: None,
        }
    }

    /// Protective stop: reduce-only market order triggered at `stop`,
    /// on the opposite side of the entry it protects
    pub fn stop_loss(product_id: i64, entry_side: OrderSide, size: i64, stop: Decimal) -> Self {
        Self {
            product_id,
            size,
            side: entry_side.opposite(),
            order_type: "market_order",
            limit_price: None,
            stop_order_type: Some("stop_loss_order"),
            stop_price: Some(stop.normalize().to_string()),
            stop_trigger_method: Some("mark_price"),
            reduce_only: Some("true"),
        }
    }

    /// Reduce-only market order flattening an open position
    pub fn market_close(product_id: i64, side: OrderSide, size: i64) -> Self {
        Self {
            product_id,
            size,
            side,
            order_type: "market_order",
            limit_price: None,
            stop_order_type: None,
            stop_price: None,
            stop_trigger_method: None,
            reduce_only: Some("true"),
        }
    }

    pub fn is_reduce_only(&self) -> bool {
        self.reduce_only.is_some()
    }
}

/// Acknowledgement of a successfully placed order
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub id: OrderId,
    pub status: OrderStatus,
}

/// One order's state as reported by a status poll or an open-orders listing
#[derive(Debug, Clone)]
pub struct OrderSnapshot {
    pub id: OrderId,
    pub status: OrderStatus,
    /// Contracts filled so far
    pub filled_size: i64,
    /// Total contracts on the order
    pub size: i64,
}

impl OrderSnapshot {
    pub fn remaining(&self) -> i64 {
        (self.size - self.filled_size).max(0)
    }
}

/// Open position for the tracked product. Size is signed: positive long,
/// negative short.
#[derive(Debug, Clone)]
pub struct PositionSnapshot {
    pub size: i64,
    pub entry_price: Option<Decimal>,
    pub symbol: Option<String>,
}

impl PositionSnapshot {
    pub fn is_open(&self) -> bool {
        self.size != 0
    }

    /// Side of the order that closes this position
    pub fn closing_side(&self) -> OrderSide {
        if self.size > 0 {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        }
    }
}
