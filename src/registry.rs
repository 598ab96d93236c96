//! Position/order registry: the single shared store of in-flight orders,
//! stop-loss links and the position tag.
//!
//! One lock guards all three so check-then-act sequences (claim a terminal
//! order, cancel-all-then-register) are atomic with respect to concurrent
//! supervisor completions. No accessor holds the lock across I/O.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::{OrderId, OrderRole, PositionState, TrackedOrder};

struct Tracked {
    order: TrackedOrder,
    /// Supervisor task handle, attached after spawning so cancel-all can
    /// abort a stale polling loop instead of waiting for it to notice.
    task: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Inner {
    orders: HashMap<OrderId, Tracked>,
    stop_links: HashMap<OrderId, OrderId>,
    position: PositionState,
}

/// Snapshot of registry state for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct RegistrySnapshot {
    pub position: PositionState,
    pub orders: Vec<TrackedOrder>,
    pub stop_links: Vec<(OrderId, OrderId)>,
}

pub struct OrderRegistry {
    inner: RwLock<Inner>,
}

impl OrderRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(Inner::default()),
        })
    }

    /// Track a freshly placed order. A duplicate id replaces the stale
    /// entry (and aborts its supervisor) rather than crashing.
    pub async fn insert(&self, order: TrackedOrder) {
        let mut inner = self.inner.write().await;

        if order.role == OrderRole::Entry {
            let stale: Vec<OrderId> = inner
                .orders
                .values()
                .filter(|t| t.order.role == OrderRole::Entry && t.order.id != order.id)
                .map(|t| t.order.id)
                .collect();
            if !stale.is_empty() {
                warn!(?stale, "registering entry while other entries are live");
            }
        }

        if let Some(previous) = inner.orders.insert(
            order.id,
            Tracked {
                order,
                task: None,
            },
        ) {
            warn!(order_id = previous.order.id, "replaced duplicate registry entry");
            if let Some(task) = previous.task {
                task.abort();
            }
        }
    }

    /// Attach the supervisor task handle to an existing entry. A missing
    /// entry means the order already reached a terminal state; the handle
    /// is dropped and the finished task simply detaches.
    pub async fn attach_task(&self, order_id: OrderId, task: JoinHandle<()>) {
        let mut inner = self.inner.write().await;
        match inner.orders.get_mut(&order_id) {
            Some(tracked) => tracked.task = Some(task),
            None => {
                debug!(order_id, "no registry entry to attach task to");
            }
        }
    }

    /// Claim an order for terminal handling. Returns `None` if another
    /// path already claimed it — the exactly-once mechanism.
    pub async fn remove(&self, order_id: OrderId) -> Option<TrackedOrder> {
        let mut inner = self.inner.write().await;
        match inner.orders.remove(&order_id) {
            Some(tracked) => Some(tracked.order),
            None => {
                warn!(order_id, "attempted to remove untracked order");
                None
            }
        }
    }

    /// Remove everything: abort supervisor tasks, clear stop-loss links,
    /// and reset a pending position tag (a realized position survives —
    /// cancelling resting orders does not close it). Returns the orders
    /// that were tracked.
    pub async fn drain(&self) -> Vec<TrackedOrder> {
        let mut inner = self.inner.write().await;

        let orders: Vec<TrackedOrder> = inner
            .orders
            .drain()
            .map(|(_, tracked)| {
                if let Some(task) = tracked.task {
                    task.abort();
                }
                tracked.order
            })
            .collect();

        inner.stop_links.clear();

        if inner.position.is_pending() {
            inner.position = PositionState::Flat;
        }

        orders
    }

    /// Record the stop-loss protecting a filled entry
    pub async fn link_stop(&self, entry_id: OrderId, stop_id: OrderId) {
        let mut inner = self.inner.write().await;
        inner.stop_links.insert(entry_id, stop_id);
    }

    pub async fn clear_links(&self) {
        let mut inner = self.inner.write().await;
        inner.stop_links.clear();
    }

    pub async fn set_position(&self, position: PositionState) {
        let mut inner = self.inner.write().await;
        debug!(from = %inner.position, to = %position, "position state transition");
        inner.position = position;
    }

    pub async fn position(&self) -> PositionState {
        self.inner.read().await.position
    }

    /// Reset a pending tag to flat, used when a resting entry dies
    /// without filling. A realized position is left untouched.
    pub async fn clear_pending_position(&self) {
        let mut inner = self.inner.write().await;
        if inner.position.is_pending() {
            inner.position = PositionState::Flat;
        }
    }

    pub async fn contains(&self, order_id: OrderId) -> bool {
        self.inner.read().await.orders.contains_key(&order_id)
    }

    pub async fn order_count(&self) -> usize {
        self.inner.read().await.orders.len()
    }

    pub async fn link_count(&self) -> usize {
        self.inner.read().await.stop_links.len()
    }

    pub async fn snapshot(&self) -> RegistrySnapshot {
        let inner = self.inner.read().await;
        RegistrySnapshot {
            position: inner.position,
            orders: inner.orders.values().map(|t| t.order.clone()).collect(),
            stop_links: inner.stop_links.iter().map(|(k, v)| (*k, *v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderSide;
    use rust_decimal_macros::dec;

    fn entry(id: OrderId) -> TrackedOrder {
        TrackedOrder::entry(id, OrderSide::Buy, 10, dec!(60000), Some(dec!(59000)))
    }

    #[tokio::test]
    async fn remove_claims_exactly_once() {
        let registry = OrderRegistry::new();
        registry.insert(entry(1)).await;

        assert!(registry.contains(1).await);
        assert!(registry.remove(1).await.is_some());
        // the second observer loses the claim
        assert!(registry.remove(1).await.is_none());
        assert_eq!(registry.order_count().await, 0);
    }

    #[tokio::test]
    async fn drain_clears_orders_links_and_pending_tag() {
        let registry = OrderRegistry::new();
        registry.insert(entry(1)).await;
        registry.link_stop(1, 2).await;
        registry.set_position(PositionState::LongPending).await;

        let drained = registry.drain().await;
        assert_eq!(drained.len(), 1);
        assert_eq!(registry.order_count().await, 0);
        assert_eq!(registry.link_count().await, 0);
        assert_eq!(registry.position().await, PositionState::Flat);
    }

    #[tokio::test]
    async fn drain_preserves_realized_position() {
        let registry = OrderRegistry::new();
        registry.insert(entry(1)).await;
        registry.set_position(PositionState::Long).await;

        registry.drain().await;
        assert_eq!(registry.position().await, PositionState::Long);
    }

    #[tokio::test]
    async fn duplicate_insert_replaces_and_aborts() {
        let registry = OrderRegistry::new();
        registry.insert(entry(1)).await;

        let task = tokio::spawn(std::future::pending::<()>());
        registry.attach_task(1, task).await;

        registry.insert(entry(1)).await;
        assert_eq!(registry.order_count().await, 1);
    }

    #[tokio::test]
    async fn attach_to_missing_entry_is_a_noop() {
        let registry = OrderRegistry::new();
        let task = tokio::spawn(async {});
        registry.attach_task(99, task).await;
        assert_eq!(registry.order_count().await, 0);
    }

    #[tokio::test]
    async fn snapshot_reflects_state() {
        let registry = OrderRegistry::new();
        registry.insert(entry(7)).await;
        registry.link_stop(7, 8).await;
        registry.set_position(PositionState::Long).await;

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.position, PositionState::Long);
        assert_eq!(snapshot.orders.len(), 1);
        assert_eq!(snapshot.orders[0].id, 7);
        assert_eq!(snapshot.stop_links, vec![(7, 8)]);
    }

    #[tokio::test]
    async fn clear_pending_position_leaves_realized() {
        let registry = OrderRegistry::new();
        registry.set_position(PositionState::ShortPending).await;
        registry.clear_pending_position().await;
        assert_eq!(registry.position().await, PositionState::Flat);

        registry.set_position(PositionState::Short).await;
        registry.clear_pending_position().await;
        assert_eq!(registry.position().await, PositionState::Short);
    }
}
