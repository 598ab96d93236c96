//! Order lifecycle supervisor: one polling task per in-flight order.
//!
//! Each task polls the order's status until it fills, dies or outlives the
//! maximum wait. Terminal handling claims the registry entry first, so a
//! duplicate observation (or a racing cancel-all) finds nothing to act on
//! and every follow-on action runs exactly once per order.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::config::ExecutionConfig;
use crate::domain::{OrderId, OrderSide, OrderStatus, PositionState, TrackedOrder};
use crate::exchange::{ExchangeApi, OrderRequest, OrderSnapshot};
use crate::notify::Notifier;
use crate::registry::OrderRegistry;

const COMPONENT: &str = "supervisor";

/// Timing knobs for the polling loop
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Delay between status polls
    pub poll_interval: Duration,
    /// Hard deadline before auto-cancellation
    pub max_wait: Duration,
    /// Spacing of partial-fill progress notifications
    pub progress_interval: Duration,
    /// Spacing of still-pending heartbeat notifications
    pub heartbeat_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(5400),
            progress_interval: Duration::from_secs(300),
            heartbeat_interval: Duration::from_secs(900),
        }
    }
}

impl From<&ExecutionConfig> for SupervisorConfig {
    fn from(execution: &ExecutionConfig) -> Self {
        Self {
            poll_interval: execution.poll_interval(),
            max_wait: execution.max_wait(),
            progress_interval: execution.progress_interval(),
            heartbeat_interval: execution.heartbeat_interval(),
        }
    }
}

/// Binds one supervisor task to one just-placed entry order
#[derive(Debug, Clone)]
pub struct SuperviseTarget {
    pub order_id: OrderId,
    pub side: OrderSide,
    /// Original order size in contracts
    pub size: i64,
    /// Protective stop to place once filled
    pub stop_loss: Option<Decimal>,
}

pub struct OrderSupervisor {
    exchange: Arc<dyn ExchangeApi>,
    registry: Arc<OrderRegistry>,
    notifier: Arc<Notifier>,
    product_id: i64,
    config: SupervisorConfig,
}

impl OrderSupervisor {
    pub fn new(
        exchange: Arc<dyn ExchangeApi>,
        registry: Arc<OrderRegistry>,
        notifier: Arc<Notifier>,
        product_id: i64,
        config: SupervisorConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            exchange,
            registry,
            notifier,
            product_id,
            config,
        })
    }

    /// Launch the polling task for one order. The caller attaches the
    /// returned handle to the registry entry.
    pub fn spawn(self: &Arc<Self>, target: SuperviseTarget) -> JoinHandle<()> {
        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            supervisor.run(target).await;
        })
    }

    async fn run(&self, target: SuperviseTarget) {
        let deadline = Instant::now() + self.config.max_wait;
        let mut poll = interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_progress = Instant::now();
        let mut last_heartbeat = Instant::now();

        self.notifier.info(
            COMPONENT,
            "Monitoring Order",
            &format!(
                "order {}: polling until fill, auto-cancel in {} min",
                target.order_id,
                self.config.max_wait.as_secs() / 60
            ),
        );

        loop {
            poll.tick().await;

            // Cancel-all removed the entry out from under us; nothing
            // left to do.
            if !self.registry.contains(target.order_id).await {
                debug!(order_id = target.order_id, "order no longer tracked, supervisor exiting");
                return;
            }

            if Instant::now() >= deadline {
                self.handle_timeout(&target).await;
                return;
            }

            let snapshot = match self.exchange.order_status(target.order_id).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    // No information this tick. The deadline keeps running.
                    warn!(order_id = target.order_id, error = %e, "status poll failed");
                    continue;
                }
            };

            match snapshot.status {
                OrderStatus::Filled => {
                    self.handle_fill(&target, &snapshot).await;
                    return;
                }
                OrderStatus::Cancelled | OrderStatus::Rejected => {
                    self.handle_dead(&target, snapshot.status).await;
                    return;
                }
                OrderStatus::PartiallyFilled => {
                    if last_progress.elapsed() >= self.config.progress_interval {
                        last_progress = Instant::now();
                        self.notifier.info(
                            COMPONENT,
                            "Order Partially Filled",
                            &format!(
                                "order {}: {} contracts filled, {} remaining, auto-cancel in {} min",
                                target.order_id,
                                snapshot.filled_size,
                                snapshot.remaining(),
                                minutes_until(deadline)
                            ),
                        );
                    }
                }
                OrderStatus::Pending => {
                    if last_heartbeat.elapsed() >= self.config.heartbeat_interval {
                        last_heartbeat = Instant::now();
                        self.notifier.info(
                            COMPONENT,
                            "Order Still Pending",
                            &format!(
                                "order {}: not filled yet, auto-cancel in {} min",
                                target.order_id,
                                minutes_until(deadline)
                            ),
                        );
                    }
                }
            }
        }
    }

    /// Fill path: claim the entry, realize the position, place the
    /// protective stop sized to the filled amount.
    async fn handle_fill(&self, target: &SuperviseTarget, snapshot: &OrderSnapshot) {
        let Some(order) = self.registry.remove(target.order_id).await else {
            debug!(order_id = target.order_id, "fill observed for already-claimed order");
            return;
        };

        let filled = if snapshot.filled_size > 0 {
            snapshot.filled_size
        } else {
            order.size
        };

        self.registry
            .set_position(PositionState::realized(target.side))
            .await;

        let Some(stop_price) = target.stop_loss else {
            self.notifier.info(
                COMPONENT,
                "Order Filled",
                &format!(
                    "order {} filled ({} contracts); no stop-loss requested",
                    target.order_id, filled
                ),
            );
            return;
        };

        let request = OrderRequest::stop_loss(self.product_id, target.side, filled, stop_price);
        match self.exchange.place_order(&request).await {
            Ok(placed) => {
                self.registry
                    .insert(TrackedOrder::stop_loss(placed.id, target.side, filled, stop_price))
                    .await;
                self.registry.link_stop(target.order_id, placed.id).await;
                self.notifier.info(
                    COMPONENT,
                    "Order Filled",
                    &format!(
                        "order {} filled ({} contracts); stop-loss {} placed at {}",
                        target.order_id, filled, placed.id, stop_price
                    ),
                );
            }
            Err(e) => {
                // The position is live without protection. Surface it loudly
                // instead of swallowing the failure.
                self.notifier.error(
                    COMPONENT,
                    "Stop-Loss Placement Failed",
                    &format!(
                        "order {} filled ({} contracts) but stop-loss at {} failed: {}. Position is unprotected",
                        target.order_id, filled, stop_price, e
                    ),
                );
            }
        }
    }

    /// Cancelled/rejected path: claim the entry and clear the pending tag
    async fn handle_dead(&self, target: &SuperviseTarget, status: OrderStatus) {
        if self.registry.remove(target.order_id).await.is_none() {
            return;
        }

        self.registry.clear_pending_position().await;

        let title = match status {
            OrderStatus::Rejected => "Order Rejected",
            _ => "Order Cancelled",
        };
        self.notifier.warning(
            COMPONENT,
            title,
            &format!("order {} reached {:?} without filling", target.order_id, status),
        );
    }

    /// Deadline path: claim the entry, then issue exactly one cancel.
    /// Both cancel outcomes are reported — the order's true state is
    /// uncertain once the deadline passed.
    async fn handle_timeout(&self, target: &SuperviseTarget) {
        if self.registry.remove(target.order_id).await.is_none() {
            return;
        }

        match self.exchange.cancel_order(target.order_id).await {
            Ok(true) => {
                self.notifier.warning(
                    COMPONENT,
                    "Order Auto-Cancelled",
                    &format!(
                        "order {} unfilled after {} min and was cancelled",
                        target.order_id,
                        self.config.max_wait.as_secs() / 60
                    ),
                );
            }
            Ok(false) => {
                self.notifier.warning(
                    COMPONENT,
                    "Order Auto-Cancel Refused",
                    &format!(
                        "order {} hit the {} min deadline but the exchange refused the cancel; it may already be terminal",
                        target.order_id,
                        self.config.max_wait.as_secs() / 60
                    ),
                );
            }
            Err(e) => {
                self.notifier.error(
                    COMPONENT,
                    "Order Auto-Cancel Failed",
                    &format!(
                        "order {} hit the {} min deadline and the cancel request failed: {}. Exchange state is uncertain",
                        target.order_id,
                        self.config.max_wait.as_secs() / 60,
                        e
                    ),
                );
            }
        }

        self.registry.clear_pending_position().await;
    }
}

fn minutes_until(deadline: Instant) -> u64 {
    deadline.saturating_duration_since(Instant::now()).as_secs() / 60
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TrackedOrder;
    use crate::error::FlareError;
    use crate::notify::AlertLevel;
    use crate::testutil::ScriptedExchange;
    use rust_decimal_macros::dec;

    fn fast_config() -> SupervisorConfig {
        SupervisorConfig {
            poll_interval: Duration::from_millis(10),
            max_wait: Duration::from_secs(60),
            progress_interval: Duration::from_secs(300),
            heartbeat_interval: Duration::from_secs(900),
        }
    }

    struct Harness {
        exchange: Arc<ScriptedExchange>,
        registry: Arc<OrderRegistry>,
        notifier: Arc<Notifier>,
        supervisor: Arc<OrderSupervisor>,
    }

    fn harness(config: SupervisorConfig) -> Harness {
        let exchange = Arc::new(ScriptedExchange::new());
        let registry = OrderRegistry::new();
        let notifier = Arc::new(Notifier::disabled());
        let supervisor = OrderSupervisor::new(
            exchange.clone(),
            registry.clone(),
            notifier.clone(),
            27,
            config,
        );
        Harness {
            exchange,
            registry,
            notifier,
            supervisor,
        }
    }

    async fn track_entry(harness: &Harness, id: OrderId) -> SuperviseTarget {
        harness
            .registry
            .insert(TrackedOrder::entry(
                id,
                OrderSide::Buy,
                10,
                dec!(60000),
                Some(dec!(59000)),
            ))
            .await;
        harness
            .registry
            .set_position(PositionState::LongPending)
            .await;
        SuperviseTarget {
            order_id: id,
            side: OrderSide::Buy,
            size: 10,
            stop_loss: Some(dec!(59000)),
        }
    }

    #[tokio::test]
    async fn fill_places_stop_loss_and_realizes_position() {
        let harness = harness(fast_config());
        let mut rx = harness.notifier.subscribe();
        let target = track_entry(&harness, 1).await;

        harness
            .exchange
            .push_status(Ok(ScriptedExchange::snapshot(1, OrderStatus::Filled, 10, 10)));

        harness.supervisor.run(target).await;

        // position realized, entry gone, stop-loss tracked in its place
        assert_eq!(harness.registry.position().await, PositionState::Long);
        assert!(!harness.registry.contains(1).await);
        assert_eq!(harness.registry.order_count().await, 1);
        assert_eq!(harness.registry.link_count().await, 1);

        let snapshot = harness.registry.snapshot().await;
        assert_eq!(snapshot.orders[0].role, crate::domain::OrderRole::StopLoss);
        assert_eq!(snapshot.stop_links, vec![(1, 100)]);

        let placed = harness.exchange.placed_orders();
        assert_eq!(placed.len(), 1);
        let stop = &placed[0];
        assert_eq!(stop.side, OrderSide::Sell);
        assert_eq!(stop.size, 10);
        assert_eq!(stop.stop_price.as_deref(), Some("59000"));
        assert!(stop.is_reduce_only());

        // exactly one terminal notification
        let mut filled_alerts = 0;
        while let Ok(alert) = rx.try_recv() {
            if alert.title == "Order Filled" {
                filled_alerts += 1;
            }
        }
        assert_eq!(filled_alerts, 1);
    }

    #[tokio::test]
    async fn fill_size_falls_back_to_original_size() {
        let harness = harness(fast_config());
        let target = track_entry(&harness, 2).await;

        // exchange reports a fill without a size_filled figure
        harness
            .exchange
            .push_status(Ok(ScriptedExchange::snapshot(2, OrderStatus::Filled, 0, 10)));

        harness.supervisor.run(target).await;

        let placed = harness.exchange.placed_orders();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].size, 10);
    }

    #[tokio::test]
    async fn cancelled_order_notifies_and_clears_pending() {
        let harness = harness(fast_config());
        let target = track_entry(&harness, 3).await;

        harness
            .exchange
            .push_status(Ok(ScriptedExchange::snapshot(3, OrderStatus::Cancelled, 0, 10)));

        harness.supervisor.run(target).await;

        assert_eq!(harness.registry.order_count().await, 0);
        assert_eq!(harness.registry.position().await, PositionState::Flat);
        assert!(harness.exchange.placed_orders().is_empty());
        assert!(harness.exchange.cancelled_orders().is_empty());
    }

    #[tokio::test]
    async fn transient_poll_errors_do_not_stop_the_loop() {
        let harness = harness(fast_config());
        let mut rx = harness.notifier.subscribe();
        let target = track_entry(&harness, 4).await;

        harness.exchange.push_status(Err(FlareError::Exchange {
            status: 502,
            body: "bad gateway".to_string(),
        }));
        harness
            .exchange
            .push_status(Err(FlareError::Internal("connection reset".to_string())));
        harness
            .exchange
            .push_status(Ok(ScriptedExchange::snapshot(4, OrderStatus::Filled, 10, 10)));

        harness.supervisor.run(target).await;

        assert_eq!(harness.registry.position().await, PositionState::Long);
        let mut filled_alerts = 0;
        while let Ok(alert) = rx.try_recv() {
            if alert.title == "Order Filled" {
                filled_alerts += 1;
            }
        }
        assert_eq!(filled_alerts, 1);
    }

    #[tokio::test]
    async fn stop_loss_failure_is_surfaced_but_entry_stays_removed() {
        let harness = harness(fast_config());
        let mut rx = harness.notifier.subscribe();
        let target = track_entry(&harness, 5).await;

        harness
            .exchange
            .push_status(Ok(ScriptedExchange::snapshot(5, OrderStatus::Filled, 10, 10)));
        harness.exchange.push_place_result(Err(FlareError::Exchange {
            status: 400,
            body: "insufficient margin".to_string(),
        }));

        harness.supervisor.run(target).await;

        assert_eq!(harness.registry.order_count().await, 0);
        assert_eq!(harness.registry.link_count().await, 0);
        // position exists, unprotected — and the alert says so at error level
        assert_eq!(harness.registry.position().await, PositionState::Long);

        let mut saw_failure = false;
        while let Ok(alert) = rx.try_recv() {
            if alert.title == "Stop-Loss Placement Failed" {
                assert_eq!(alert.level, AlertLevel::Error);
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_issues_exactly_one_cancel() {
        let config = SupervisorConfig {
            poll_interval: Duration::from_secs(1),
            max_wait: Duration::from_secs(5),
            progress_interval: Duration::from_secs(300),
            heartbeat_interval: Duration::from_secs(900),
        };
        let harness = harness(config);
        let mut rx = harness.notifier.subscribe();
        let target = track_entry(&harness, 6).await;

        // never fills
        harness
            .exchange
            .set_default_status(ScriptedExchange::snapshot(6, OrderStatus::Pending, 0, 10));

        harness.supervisor.run(target).await;

        assert_eq!(harness.exchange.cancelled_orders(), vec![6]);
        assert_eq!(harness.registry.order_count().await, 0);
        assert_eq!(harness.registry.position().await, PositionState::Flat);

        let mut cancel_alerts = 0;
        while let Ok(alert) = rx.try_recv() {
            if alert.title == "Order Auto-Cancelled" {
                cancel_alerts += 1;
            }
        }
        assert_eq!(cancel_alerts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_cancel_failure_is_still_reported_once() {
        let config = SupervisorConfig {
            poll_interval: Duration::from_secs(1),
            max_wait: Duration::from_secs(3),
            progress_interval: Duration::from_secs(300),
            heartbeat_interval: Duration::from_secs(900),
        };
        let harness = harness(config);
        let mut rx = harness.notifier.subscribe();
        let target = track_entry(&harness, 7).await;

        harness
            .exchange
            .set_default_status(ScriptedExchange::snapshot(7, OrderStatus::Pending, 0, 10));
        harness.exchange.push_cancel_result(Err(FlareError::Internal(
            "connection reset".to_string(),
        )));

        harness.supervisor.run(target).await;

        // removed regardless of the cancel outcome
        assert_eq!(harness.registry.order_count().await, 0);

        let mut failure_alerts = 0;
        while let Ok(alert) = rx.try_recv() {
            if alert.title == "Order Auto-Cancel Failed" {
                assert_eq!(alert.level, AlertLevel::Error);
                failure_alerts += 1;
            }
        }
        assert_eq!(failure_alerts, 1);
    }

    #[tokio::test]
    async fn untracked_order_exits_without_polling() {
        let harness = harness(fast_config());
        let target = SuperviseTarget {
            order_id: 99,
            side: OrderSide::Buy,
            size: 10,
            stop_loss: None,
        };

        harness.supervisor.run(target).await;

        assert_eq!(harness.exchange.status_calls(), 0);
        assert!(harness.exchange.cancelled_orders().is_empty());
    }
}
