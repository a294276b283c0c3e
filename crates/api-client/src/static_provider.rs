use crate::error::ApiError;
use crate::{AtrPoint, BarsRequest, MarketDataProvider};
use async_trait::async_trait;
use core_types::BarSeries;
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum Canned<T> {
    Data(T),
    Failure(String),
}

/// An in-memory provider serving pre-loaded data keyed by interval.
///
/// Used for offline runs and tests. Intervals with nothing registered return empty data;
/// intervals registered as failing return [`ApiError::Unavailable`].
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    bars: HashMap<String, Canned<BarSeries>>,
    atr: HashMap<String, Canned<Vec<AtrPoint>>>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(mut self, interval: &str, series: BarSeries) -> Self {
        self.bars.insert(interval.to_string(), Canned::Data(series));
        self
    }

    pub fn with_bars_failure(mut self, interval: &str, message: &str) -> Self {
        self.bars
            .insert(interval.to_string(), Canned::Failure(message.to_string()));
        self
    }

    pub fn with_atr(mut self, interval: &str, points: Vec<AtrPoint>) -> Self {
        self.atr.insert(interval.to_string(), Canned::Data(points));
        self
    }

    pub fn with_atr_failure(mut self, interval: &str, message: &str) -> Self {
        self.atr
            .insert(interval.to_string(), Canned::Failure(message.to_string()));
        self
    }
}

#[async_trait]
impl MarketDataProvider for StaticProvider {
    /// Applies the request's date bounds and output size to the stored series.
    async fn fetch_bars(&self, request: &BarsRequest) -> Result<BarSeries, ApiError> {
        match self.bars.get(&request.interval) {
            None => Ok(BarSeries::empty()),
            Some(Canned::Failure(message)) => Err(ApiError::Unavailable(message.clone())),
            Some(Canned::Data(series)) => {
                let bounded = match (request.start, request.end) {
                    (Some(start), Some(end)) => series.between(start, end),
                    _ => series.clone(),
                };
                let skip = bounded.len().saturating_sub(request.output_size);
                Ok(bounded.slice_from(skip))
            }
        }
    }

    async fn fetch_atr(
        &self,
        _symbol: &str,
        interval: &str,
        _period: usize,
    ) -> Result<Vec<AtrPoint>, ApiError> {
        match self.atr.get(interval) {
            None => Ok(Vec::new()),
            Some(Canned::Failure(message)) => Err(ApiError::Unavailable(message.clone())),
            Some(Canned::Data(points)) => Ok(points.clone()),
        }
    }
}
