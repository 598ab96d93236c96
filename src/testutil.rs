//! Scripted exchange double shared by supervisor, router and API tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{OrderId, OrderStatus};
use crate::error::{FlareError, Result};
use crate::exchange::{ExchangeApi, OrderRequest, OrderSnapshot, PlacedOrder, PositionSnapshot};

/// Exchange double that replays queued responses and records every call.
/// Unscripted placements succeed with sequential ids; unscripted cancels
/// succeed; unscripted status polls fall back to the configured default.
pub struct ScriptedExchange {
    statuses: Mutex<VecDeque<Result<OrderSnapshot>>>,
    default_status: Mutex<Option<OrderSnapshot>>,
    place_results: Mutex<VecDeque<Result<PlacedOrder>>>,
    cancel_results: Mutex<VecDeque<Result<bool>>>,
    open: Mutex<Vec<OrderSnapshot>>,
    position: Mutex<Option<PositionSnapshot>>,
    placed: Mutex<Vec<OrderRequest>>,
    cancelled: Mutex<Vec<OrderId>>,
    status_calls: AtomicU32,
    next_id: AtomicI64,
}

impl ScriptedExchange {
    pub fn new() -> Self {
        Self {
            statuses: Mutex::new(VecDeque::new()),
            default_status: Mutex::new(None),
            place_results: Mutex::new(VecDeque::new()),
            cancel_results: Mutex::new(VecDeque::new()),
            open: Mutex::new(Vec::new()),
            position: Mutex::new(None),
            placed: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            status_calls: AtomicU32::new(0),
            next_id: AtomicI64::new(100),
        }
    }

    pub fn snapshot(id: OrderId, status: OrderStatus, filled_size: i64, size: i64) -> OrderSnapshot {
        OrderSnapshot {
            id,
            status,
            filled_size,
            size,
        }
    }

    pub fn push_status(&self, status: Result<OrderSnapshot>) {
        self.statuses.lock().unwrap().push_back(status);
    }

    pub fn set_default_status(&self, snapshot: OrderSnapshot) {
        *self.default_status.lock().unwrap() = Some(snapshot);
    }

    pub fn push_place_result(&self, result: Result<PlacedOrder>) {
        self.place_results.lock().unwrap().push_back(result);
    }

    pub fn push_cancel_result(&self, result: Result<bool>) {
        self.cancel_results.lock().unwrap().push_back(result);
    }

    pub fn set_open_orders(&self, orders: Vec<OrderSnapshot>) {
        *self.open.lock().unwrap() = orders;
    }

    pub fn set_position(&self, position: Option<PositionSnapshot>) {
        *self.position.lock().unwrap() = position;
    }

    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.placed.lock().unwrap().clone()
    }

    pub fn cancelled_orders(&self) -> Vec<OrderId> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeApi for ScriptedExchange {
    async fn place_order(&self, request: &OrderRequest) -> Result<PlacedOrder> {
        self.placed.lock().unwrap().push(request.clone());

        if let Some(result) = self.place_results.lock().unwrap().pop_front() {
            return result;
        }
        Ok(PlacedOrder {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            status: OrderStatus::Pending,
        })
    }

    async fn order_status(&self, order_id: OrderId) -> Result<OrderSnapshot> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(result) = self.statuses.lock().unwrap().pop_front() {
            return result;
        }
        if let Some(default) = self.default_status.lock().unwrap().clone() {
            return Ok(default);
        }
        Err(FlareError::Internal(format!(
            "no scripted status for order {}",
            order_id
        )))
    }

    async fn cancel_order(&self, order_id: OrderId) -> Result<bool> {
        self.cancelled.lock().unwrap().push(order_id);

        if let Some(result) = self.cancel_results.lock().unwrap().pop_front() {
            return result;
        }
        Ok(true)
    }

    async fn open_orders(&self) -> Result<Vec<OrderSnapshot>> {
        Ok(self.open.lock().unwrap().clone())
    }

    async fn position(&self) -> Result<Option<PositionSnapshot>> {
        Ok(self.position.lock().unwrap().clone())
    }
}
