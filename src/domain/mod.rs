mod order;
mod signal;

pub use order::{OrderId, OrderRole, OrderSide, OrderStatus, PositionState, TrackedOrder};
pub use signal::{AlertType, EntryPrice, EntrySignal, Signal, SignalPayload};
