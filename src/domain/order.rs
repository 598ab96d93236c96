use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Exchange-assigned order identifier
pub type OrderId = i64;

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// The side that closes a position opened on this side
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why an order exists in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderRole {
    /// Opens a new position
    Entry,
    /// Protects an open position, reduce-only
    StopLoss,
}

/// Order status as reported by the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Resting on the book, nothing filled yet
    Pending,
    /// Some contracts filled, remainder still resting
    PartiallyFilled,
    /// Fully filled
    Filled,
    /// Cancelled on the exchange
    Cancelled,
    /// Rejected by the exchange
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::PartiallyFilled)
    }

    /// Map an exchange state string onto the status enum. Unknown states
    /// are treated as still pending so the supervisor keeps polling.
    pub fn from_exchange_state(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "filled" | "closed" => OrderStatus::Filled,
            "partially_filled" => OrderStatus::PartiallyFilled,
            "cancelled" | "canceled" => OrderStatus::Cancelled,
            "rejected" => OrderStatus::Rejected,
            _ => OrderStatus::Pending,
        }
    }
}

/// Order tracked in the registry while a supervisor polls it
#[derive(Debug, Clone, Serialize)]
pub struct TrackedOrder {
    pub id: OrderId,
    pub side: OrderSide,
    pub role: OrderRole,
    /// Original order size in contracts
    pub size: i64,
    /// Limit price for limit entries, trigger price otherwise
    pub price: Decimal,
    /// Protective stop price to place once the entry fills
    pub stop_loss: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl TrackedOrder {
    pub fn entry(
        id: OrderId,
        side: OrderSide,
        size: i64,
        price: Decimal,
        stop_loss: Option<Decimal>,
    ) -> Self {
        Self {
            id,
            side,
            role: OrderRole::Entry,
            size,
            price,
            stop_loss,
            created_at: Utc::now(),
        }
    }

    /// The protective order placed after `entry_side` filled
    pub fn stop_loss(id: OrderId, entry_side: OrderSide, size: i64, stop: Decimal) -> Self {
        Self {
            id,
            side: entry_side.opposite(),
            role: OrderRole::StopLoss,
            size,
            price: stop,
            stop_loss: None,
            created_at: Utc::now(),
        }
    }
}

/// Process-wide position tag. Only one non-flat tag exists at a time; the
/// router clears outstanding state before placing a new entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    Flat,
    LongPending,
    Long,
    ShortPending,
    Short,
}

impl Default for PositionState {
    fn default() -> Self {
        PositionState::Flat
    }
}

impl PositionState {
    /// Tag for an entry order resting on the book
    pub fn pending(side: OrderSide) -> Self {
        match side {
            OrderSide::Buy => PositionState::LongPending,
            OrderSide::Sell => PositionState::ShortPending,
        }
    }

    /// Tag for a filled entry
    pub fn realized(side: OrderSide) -> Self {
        match side {
            OrderSide::Buy => PositionState::Long,
            OrderSide::Sell => PositionState::Short,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, PositionState::LongPending | PositionState::ShortPending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PositionState::Flat => "flat",
            PositionState::LongPending => "long_pending",
            PositionState::Long => "long",
            PositionState::ShortPending => "short_pending",
            PositionState::Short => "short",
        }
    }
}

impl std::fmt::Display for PositionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_predicates() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(OrderStatus::Pending.is_active());
        assert!(OrderStatus::PartiallyFilled.is_active());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
    }

    #[test]
    fn exchange_state_mapping() {
        assert_eq!(OrderStatus::from_exchange_state("filled"), OrderStatus::Filled);
        assert_eq!(OrderStatus::from_exchange_state("closed"), OrderStatus::Filled);
        assert_eq!(
            OrderStatus::from_exchange_state("partially_filled"),
            OrderStatus::PartiallyFilled
        );
        assert_eq!(
            OrderStatus::from_exchange_state("cancelled"),
            OrderStatus::Cancelled
        );
        assert_eq!(OrderStatus::from_exchange_state("open"), OrderStatus::Pending);
        // unknown states keep the supervisor polling
        assert_eq!(OrderStatus::from_exchange_state("???"), OrderStatus::Pending);
    }

    #[test]
    fn side_opposite() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
    }

    #[test]
    fn position_tags() {
        assert_eq!(PositionState::pending(OrderSide::Buy), PositionState::LongPending);
        assert_eq!(PositionState::realized(OrderSide::Sell), PositionState::Short);
        assert!(PositionState::ShortPending.is_pending());
        assert!(!PositionState::Long.is_pending());
        assert_eq!(PositionState::Flat.as_str(), "flat");
    }
}
