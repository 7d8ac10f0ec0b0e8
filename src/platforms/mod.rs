//! External venue integrations.
//!
//! Defines the gateway traits the core depends on and provides the two
//! HTTP adapters:
//! - Gamma (`gamma`) — unauthenticated market discovery
//! - CLOB (`clob`) — order books and signed order placement
//!
//! The adapters own all JSON drift handling; the core only ever sees
//! normalised [`Market`](crate::types::Market) values and typed errors.

pub mod clob;
pub mod gamma;

use async_trait::async_trait;

use crate::types::{GatewayError, Market, MarketGroup};

/// One price level of an order book side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookLevel {
    pub price: f64,
    /// Size in shares (token units).
    pub size: f64,
}

/// A snapshot of a token's order book, zero-size levels removed.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    pub asks: Vec<BookLevel>,
    pub bids: Vec<BookLevel>,
}

/// Result of submitting an order: the venue order id, or the venue's
/// rejection message.
#[derive(Debug, Clone)]
pub struct OrderAck {
    pub order_id: String,
    pub error: Option<String>,
}

/// Read-only market discovery surface.
#[async_trait]
pub trait MarketGateway: Send + Sync {
    /// Current event groups, ordered by recency/volume.
    async fn get_events(&self, limit: u32) -> Result<Vec<MarketGroup>, GatewayError>;

    /// High-volume markets, used as a fallback discovery path.
    async fn get_trending_markets(&self, limit: u32) -> Result<Vec<Market>, GatewayError>;

    /// Full-text market search.
    async fn search_markets(&self, query: &str, limit: u32) -> Result<Vec<Market>, GatewayError>;
}

/// Authenticated order surface. The signing identity is opaque to the
/// core; adapters hold whatever credential material the venue requires.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Top levels of a token's order book.
    async fn get_order_book(&self, token_id: &str) -> Result<OrderBook, GatewayError>;

    /// Submit a good-till-cancelled limit buy. A venue-side rejection is
    /// an `OrderAck` with `error` set, not a gateway error.
    async fn place_limit_buy_gtc(
        &self,
        token_id: &str,
        price: f64,
        size: f64,
    ) -> Result<OrderAck, GatewayError>;

    /// Available venue balance in USD, for the interval summary.
    async fn get_balance(&self) -> Result<f64, GatewayError>;

    /// Whether this gateway can actually place orders.
    fn is_executable(&self) -> bool;
}
