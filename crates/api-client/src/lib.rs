use crate::error::ApiError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::BarSeries;
use serde::{Deserialize, Serialize};

pub mod error;
pub mod static_provider;
pub mod twelve_data;

// --- Public API ---
pub use static_provider::StaticProvider;
pub use twelve_data::TwelveDataClient;

/// Parameters of a bar fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarsRequest {
    pub symbol: String,
    pub interval: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub output_size: usize,
}

impl BarsRequest {
    /// The most recent `output_size` bars, with no date bounds.
    pub fn latest(symbol: &str, interval: &str, output_size: usize) -> Self {
        Self {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            start: None,
            end: None,
            output_size,
        }
    }

    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }
}

/// One reading of the provider's ATR indicator feed.
///
/// The value is kept as the provider sent it; callers decide how to treat values that
/// do not parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtrPoint {
    pub timestamp: DateTime<Utc>,
    pub atr: String,
}

/// The generic, abstract interface for a market data source.
///
/// This trait is the contract the tools use, allowing the underlying implementation
/// (HTTP or in-memory) to be swapped out.
///
/// `Err` means the fetch itself failed; `Ok` with an empty result means the source had
/// no data for the request.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetches OHLCV bars in chronological order.
    async fn fetch_bars(&self, request: &BarsRequest) -> Result<BarSeries, ApiError>;

    /// Fetches the ATR indicator series, oldest first.
    async fn fetch_atr(
        &self,
        symbol: &str,
        interval: &str,
        period: usize,
    ) -> Result<Vec<AtrPoint>, ApiError>;
}
