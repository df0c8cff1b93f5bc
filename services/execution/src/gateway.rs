//! Execution-gateway boundary.

use crate::error::GatewayError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::{Direction, SignalId, Symbol};

/// Order submission request derived from a sized signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub signal_id: SignalId,
    pub symbol: Symbol,
    pub direction: Direction,
    pub entry: Decimal,
    pub stop: Decimal,
    pub targets: Vec<Decimal>,
    pub size: Decimal,
}

/// Gateway acknowledgement of a submitted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
}

/// Fill progress as reported by the gateway. The engine never assumes a
/// synchronous fill; `Filled` and `PartiallyFilled` each have their own
/// close-out handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillState {
    Pending,
    PartiallyFilled,
    Filled,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillReport {
    pub order_id: String,
    pub state: FillState,
    /// Average fill price, present once any quantity has filled.
    pub price: Option<Decimal>,
    pub filled_qty: Decimal,
}

/// External broker-facing execution collaborator.
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    /// Submit an order. Not cancellable mid-flight; the caller enforces a
    /// submission timeout and reconciles afterwards.
    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderAck, GatewayError>;

    /// Query fill progress for an acknowledged order.
    async fn query_fill(&self, order_id: &str) -> Result<FillReport, GatewayError>;

    /// Close an open position at market, returning the closing fill.
    async fn close_position(&self, order_id: &str) -> Result<FillReport, GatewayError>;
}
