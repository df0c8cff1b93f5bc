//! Scripted execution gateway for tests.

use crate::error::GatewayError;
use crate::gateway::{ExecutionGateway, FillReport, FillState, OrderAck, OrderRequest};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// In-memory execution gateway with scriptable failures and fills.
pub struct MockExecutionGateway {
    next_order: AtomicU64,
    submit_calls: AtomicU64,
    transient_failures: AtomicU64,
    fatal_reason: RwLock<Option<String>>,
    fills: DashMap<String, FillReport>,
    close_price: RwLock<Option<Decimal>>,
    submitted: Mutex<Vec<OrderRequest>>,
    latency: RwLock<Duration>,
}

impl MockExecutionGateway {
    pub fn new() -> Self {
        Self {
            next_order: AtomicU64::new(1),
            submit_calls: AtomicU64::new(0),
            transient_failures: AtomicU64::new(0),
            fatal_reason: RwLock::new(None),
            fills: DashMap::new(),
            close_price: RwLock::new(None),
            submitted: Mutex::new(Vec::new()),
            latency: RwLock::new(Duration::ZERO),
        }
    }

    /// Fail the next `n` submissions with a transient error.
    pub fn fail_submissions(&self, n: u64) {
        self.transient_failures.store(n, Ordering::SeqCst);
    }

    /// Permanently reject every submission.
    pub fn reject_all(&self, reason: &str) {
        *self.fatal_reason.write() = Some(reason.to_string());
    }

    /// Delay every gateway call, for submission-timeout tests.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write() = latency;
    }

    /// Script the fill report returned for an order.
    pub fn set_fill(&self, order_id: &str, state: FillState, price: Option<Decimal>, qty: Decimal) {
        self.fills.insert(
            order_id.to_string(),
            FillReport {
                order_id: order_id.to_string(),
                state,
                price,
                filled_qty: qty,
            },
        );
    }

    /// Price used for `close_position` fills.
    pub fn set_close_price(&self, price: Decimal) {
        *self.close_price.write() = Some(price);
    }

    pub fn submit_count(&self) -> u64 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn submitted_orders(&self) -> Vec<OrderRequest> {
        self.submitted.lock().clone()
    }

    pub fn last_order_id(&self) -> Option<String> {
        let n = self.next_order.load(Ordering::SeqCst);
        if n <= 1 {
            None
        } else {
            Some(format!("ord-{}", n - 1))
        }
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.read();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MockExecutionGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionGateway for MockExecutionGateway {
    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderAck, GatewayError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if let Some(reason) = self.fatal_reason.read().clone() {
            return Err(GatewayError::Fatal { reason });
        }

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(GatewayError::Transient {
                reason: "scripted transient failure".into(),
            });
        }

        let order_id = format!("ord-{}", self.next_order.fetch_add(1, Ordering::SeqCst));
        self.fills.insert(
            order_id.clone(),
            FillReport {
                order_id: order_id.clone(),
                state: FillState::Pending,
                price: None,
                filled_qty: Decimal::ZERO,
            },
        );
        self.submitted.lock().push(request.clone());
        Ok(OrderAck { order_id })
    }

    async fn query_fill(&self, order_id: &str) -> Result<FillReport, GatewayError> {
        self.simulate_latency().await;
        self.fills
            .get(order_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| GatewayError::Transient {
                reason: format!("unknown order {order_id}"),
            })
    }

    async fn close_position(&self, order_id: &str) -> Result<FillReport, GatewayError> {
        self.simulate_latency().await;
        let price = *self.close_price.read();
        Ok(FillReport {
            order_id: order_id.to_string(),
            state: FillState::Filled,
            price,
            filled_qty: Decimal::ONE,
        })
    }
}
