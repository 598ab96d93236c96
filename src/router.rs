//! Signal router: turns validated webhook intents into exchange actions
//! and registry state, spawning a supervisor for every entry it places.

use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::config::{AppConfig, EntryOrderType};
use crate::domain::{EntryPrice, EntrySignal, OrderId, PositionState, Signal, TrackedOrder};
use crate::error::{FlareError, Result};
use crate::exchange::{ExchangeApi, OrderRequest};
use crate::notify::Notifier;
use crate::registry::OrderRegistry;
use crate::supervisor::{OrderSupervisor, SuperviseTarget};

const COMPONENT: &str = "router";

/// Trading parameters the router needs per signal
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub product_id: i64,
    pub symbol: String,
    pub default_lot_size: Decimal,
    pub contract_size: Decimal,
    pub entry_order_type: EntryOrderType,
}

impl RouterConfig {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            product_id: config.exchange.product_id,
            symbol: config.exchange.symbol.clone(),
            default_lot_size: config.trading.default_lot_size,
            contract_size: config.trading.contract_size,
            entry_order_type: config.trading.entry_order_type,
        }
    }
}

/// What the exit path did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Nothing was open; still a success
    NoPosition,
    Closed { contracts: i64 },
}

/// What handling a signal did, for the HTTP response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    EntryPlaced { order_id: OrderId },
    Exited(ExitOutcome),
}

pub struct SignalRouter {
    exchange: Arc<dyn ExchangeApi>,
    registry: Arc<OrderRegistry>,
    notifier: Arc<Notifier>,
    supervisor: Arc<OrderSupervisor>,
    config: RouterConfig,
}

impl SignalRouter {
    pub fn new(
        exchange: Arc<dyn ExchangeApi>,
        registry: Arc<OrderRegistry>,
        notifier: Arc<Notifier>,
        supervisor: Arc<OrderSupervisor>,
        config: RouterConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            exchange,
            registry,
            notifier,
            supervisor,
            config,
        })
    }

    /// Dispatch a validated signal
    pub async fn handle(&self, signal: Signal) -> Result<SignalOutcome> {
        match signal {
            Signal::Entry(entry) => {
                let order_id = self.on_entry(entry).await?;
                Ok(SignalOutcome::EntryPlaced { order_id })
            }
            Signal::Exit => {
                let outcome = self.on_exit().await?;
                Ok(SignalOutcome::Exited(outcome))
            }
        }
    }

    /// Convert a lot in base units into whole contracts
    fn to_contracts(&self, lot: Decimal) -> Result<i64> {
        let contracts = (lot / self.config.contract_size)
            .trunc()
            .to_i64()
            .unwrap_or(0);
        if contracts <= 0 {
            return Err(FlareError::Validation(format!(
                "lot size {} is below one contract ({})",
                lot, self.config.contract_size
            )));
        }
        Ok(contracts)
    }

    /// Entry path: clear outstanding state, place the order, register it
    /// and spawn its supervisor. Placement failure leaves the position
    /// tag flat — there is no pending state for an order that does not
    /// exist.
    pub async fn on_entry(&self, entry: EntrySignal) -> Result<OrderId> {
        let lot = entry.lot_size.unwrap_or(self.config.default_lot_size);
        let contracts = self.to_contracts(lot)?;
        let price = entry.price.value();

        self.notifier.info(
            COMPONENT,
            "Entry Signal",
            &format!(
                "{} {} at {} ({} contracts, stop {})",
                entry.side,
                self.config.symbol,
                price,
                contracts,
                entry
                    .stop_loss
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "none".to_string())
            ),
        );

        // A new entry must not race a supervisor still owning the previous
        // order: clear everything before placing.
        self.cancel_all().await?;

        let request = match (self.config.entry_order_type, entry.price) {
            (EntryOrderType::StopMarket, EntryPrice::Trigger(trigger)) => {
                OrderRequest::stop_market_entry(self.config.product_id, entry.side, contracts, trigger)
            }
            (EntryOrderType::StopMarket, EntryPrice::Reference(reference)) => {
                // no trigger supplied; fall back to a resting limit order
                debug!("stop_market entry configured but only a reference price given");
                OrderRequest::limit_entry(self.config.product_id, entry.side, contracts, reference)
            }
            (EntryOrderType::Limit, _) => {
                OrderRequest::limit_entry(self.config.product_id, entry.side, contracts, price)
            }
        };

        let placed = match self.exchange.place_order(&request).await {
            Ok(placed) => placed,
            Err(e) => {
                self.registry.set_position(PositionState::Flat).await;
                self.notifier.error(
                    COMPONENT,
                    "Entry Placement Failed",
                    &format!("{} {} at {}: {}", entry.side, self.config.symbol, price, e),
                );
                return Err(e);
            }
        };

        self.registry
            .insert(TrackedOrder::entry(
                placed.id,
                entry.side,
                contracts,
                price,
                entry.stop_loss,
            ))
            .await;
        self.registry
            .set_position(PositionState::pending(entry.side))
            .await;

        let handle = self.supervisor.spawn(SuperviseTarget {
            order_id: placed.id,
            side: entry.side,
            size: contracts,
            stop_loss: entry.stop_loss,
        });
        self.registry.attach_task(placed.id, handle).await;

        self.notifier.info(
            COMPONENT,
            "Entry Order Placed",
            &format!(
                "order {}: {} {} contracts at {}",
                placed.id, entry.side, contracts, price
            ),
        );

        Ok(placed.id)
    }

    /// Exit path: cancel resting orders, then flatten whatever position
    /// the exchange reports. Already-flat is a success, not an error, and
    /// a failed close leaves state untouched for the operator to retry.
    pub async fn on_exit(&self) -> Result<ExitOutcome> {
        if let Err(e) = self.cancel_all().await {
            // Keep going: flattening the position matters more than the
            // resting orders, which the operator can clean up afterwards.
            warn!(error = %e, "cancel-all failed during exit, attempting close anyway");
        }

        let position = match self.exchange.position().await {
            Ok(position) => position,
            Err(e) => {
                self.notifier.error(
                    COMPONENT,
                    "Exit Failed",
                    &format!("could not fetch the current position: {}", e),
                );
                return Err(e);
            }
        };

        let Some(position) = position.filter(|p| p.is_open()) else {
            self.registry.set_position(PositionState::Flat).await;
            self.registry.clear_links().await;
            self.notifier
                .info(COMPONENT, "No Position To Close", "exit signal with a flat book");
            return Ok(ExitOutcome::NoPosition);
        };

        let contracts = position.size.abs();
        let request =
            OrderRequest::market_close(self.config.product_id, position.closing_side(), contracts);

        match self.exchange.place_order(&request).await {
            Ok(_) => {
                self.registry.set_position(PositionState::Flat).await;
                self.registry.clear_links().await;
                self.notifier.info(
                    COMPONENT,
                    "Position Closed",
                    &format!(
                        "{} {} contracts closed at market",
                        position.closing_side(),
                        contracts
                    ),
                );
                Ok(ExitOutcome::Closed { contracts })
            }
            Err(e) => {
                self.notifier.error(
                    COMPONENT,
                    "Position Close Failed",
                    &format!("{} contracts still open: {}", contracts, e),
                );
                Err(e)
            }
        }
    }

    /// Cancel every open order for the product and clear the registry,
    /// aborting any supervisors still polling. Returns how many orders
    /// the exchange confirmed cancelled.
    pub async fn cancel_all(&self) -> Result<usize> {
        let open = match self.exchange.open_orders().await {
            Ok(open) => open,
            Err(e) => {
                self.notifier.error(
                    COMPONENT,
                    "Cancel-All Failed",
                    &format!("could not list open orders: {}", e),
                );
                return Err(e);
            }
        };

        let mut cancelled = 0usize;
        for order in &open {
            match self.exchange.cancel_order(order.id).await {
                Ok(true) => {
                    debug!(order_id = order.id, "cancelled order");
                    cancelled += 1;
                }
                Ok(false) => {
                    warn!(order_id = order.id, "exchange refused cancel, order likely terminal");
                }
                Err(e) => {
                    warn!(order_id = order.id, error = %e, "cancel request failed");
                }
            }
        }

        self.registry.drain().await;

        if cancelled > 0 {
            self.notifier.info(
                COMPONENT,
                "Orders Cancelled",
                &format!("{} open orders cancelled", cancelled),
            );
        }

        Ok(cancelled)
    }
}
