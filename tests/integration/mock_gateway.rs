//! Mock gateways for integration testing.
//!
//! Deterministic, in-memory implementations of the market and order
//! gateways. Markets, books, and order outcomes are fully controllable
//! from test code; a forced-error switch simulates gateway outages.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use polyhedge::platforms::{BookLevel, MarketGateway, OrderAck, OrderBook, OrderGateway};
use polyhedge::types::{GatewayError, Market, MarketGroup};

/// Build a market with test defaults.
pub fn market(id: &str, question: &str, yes: f64, no: f64, volume: f64) -> Market {
    Market {
        id: id.to_string(),
        question: question.to_string(),
        yes_price: yes,
        no_price: no,
        yes_token_id: format!("{id}-yes"),
        no_token_id: Some(format!("{id}-no")),
        volume_24h: volume,
        active: true,
        closed: false,
        resolved: false,
        end_date: None,
    }
}

pub fn level(price: f64, size: f64) -> BookLevel {
    BookLevel { price, size }
}

/// A book deep enough to pass every depth check.
pub fn deep_book() -> OrderBook {
    OrderBook {
        asks: vec![level(0.50, 100_000.0)],
        bids: vec![level(0.49, 100_000.0)],
    }
}

// ---------------------------------------------------------------------------
// Market gateway
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockMarketGateway {
    pub events: Vec<MarketGroup>,
    pub trending: Vec<Market>,
    pub search_results: HashMap<String, Vec<Market>>,
    force_error: Mutex<Option<String>>,
}

impl MockMarketGateway {
    pub fn with_events(events: Vec<MarketGroup>) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }

    pub fn with_search(search_results: HashMap<String, Vec<Market>>) -> Self {
        Self {
            search_results,
            ..Default::default()
        }
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    fn check_error(&self) -> Result<(), GatewayError> {
        if let Some(msg) = self.force_error.lock().unwrap().as_ref() {
            return Err(GatewayError::Transport(msg.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl MarketGateway for MockMarketGateway {
    async fn get_events(&self, _limit: u32) -> Result<Vec<MarketGroup>, GatewayError> {
        self.check_error()?;
        Ok(self.events.clone())
    }

    async fn get_trending_markets(&self, _limit: u32) -> Result<Vec<Market>, GatewayError> {
        self.check_error()?;
        Ok(self.trending.clone())
    }

    async fn search_markets(&self, query: &str, _limit: u32) -> Result<Vec<Market>, GatewayError> {
        self.check_error()?;
        Ok(self.search_results.get(query).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Order gateway
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub token_id: String,
    pub price: f64,
    pub size: f64,
}

pub struct MockOrderGateway {
    /// token_id → order book; missing tokens get the default deep book.
    pub books: HashMap<String, OrderBook>,
    /// token_id → venue rejection message.
    pub rejections: HashMap<String, String>,
    pub balance: f64,
    pub executable: bool,
    placed: Mutex<Vec<PlacedOrder>>,
    force_error: Mutex<Option<String>>,
}

impl Default for MockOrderGateway {
    fn default() -> Self {
        Self {
            books: HashMap::new(),
            rejections: HashMap::new(),
            balance: 250.0,
            executable: true,
            placed: Mutex::new(Vec::new()),
            force_error: Mutex::new(None),
        }
    }
}

impl MockOrderGateway {
    pub fn rejecting(token_id: &str, message: &str) -> Self {
        let mut gw = Self::default();
        gw.rejections
            .insert(token_id.to_string(), message.to_string());
        gw
    }

    pub fn with_book(token_id: &str, book: OrderBook) -> Self {
        let mut gw = Self::default();
        gw.books.insert(token_id.to_string(), book);
        gw
    }

    pub fn placed_orders(&self) -> Vec<PlacedOrder> {
        self.placed.lock().unwrap().clone()
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    fn check_error(&self) -> Result<(), GatewayError> {
        if let Some(msg) = self.force_error.lock().unwrap().as_ref() {
            return Err(GatewayError::Transport(msg.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderGateway for MockOrderGateway {
    async fn get_order_book(&self, token_id: &str) -> Result<OrderBook, GatewayError> {
        self.check_error()?;
        Ok(self.books.get(token_id).cloned().unwrap_or_else(deep_book))
    }

    async fn place_limit_buy_gtc(
        &self,
        token_id: &str,
        price: f64,
        size: f64,
    ) -> Result<OrderAck, GatewayError> {
        self.check_error()?;
        if let Some(msg) = self.rejections.get(token_id) {
            return Ok(OrderAck {
                order_id: String::new(),
                error: Some(msg.clone()),
            });
        }
        self.placed.lock().unwrap().push(PlacedOrder {
            token_id: token_id.to_string(),
            price,
            size,
        });
        Ok(OrderAck {
            order_id: format!("ord-{token_id}"),
            error: None,
        })
    }

    async fn get_balance(&self) -> Result<f64, GatewayError> {
        self.check_error()?;
        Ok(self.balance)
    }

    fn is_executable(&self) -> bool {
        self.executable
    }
}

// ---------------------------------------------------------------------------
// Notification sink
// ---------------------------------------------------------------------------

pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl polyhedge::notify::NotifySink for RecordingSink {
    async fn send(&self, text: &str) {
        self.messages.lock().unwrap().push(text.to_string());
    }
}
