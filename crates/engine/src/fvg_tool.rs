use crate::error::EngineError;
use crate::session::session_window;
use crate::util::fetch;
use analytics::{FairValueGap, FairValueGapTracker, GapStatistics, NearestGaps, nearest_gaps};
use api_client::{BarsRequest, MarketDataProvider};
use chrono::{DateTime, Utc};
use configuration::{Config, FvgTimeframe, OrbConfig};
use core_types::precision::serialize_price;
use core_types::{BarSeries, Status};
use futures::future::join_all;
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;

/// Interval whose latest close is taken as the current price.
const REFERENCE_INTERVAL: &str = "1min";
const REGULAR_SESSION_MINUTES: f64 = 390.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeframeGaps {
    pub fvg_count: usize,
    pub gaps: Vec<FairValueGap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TimeframeGaps {
    fn failed(message: &str) -> Self {
        Self {
            fvg_count: 0,
            gaps: Vec::new(),
            error: Some(message.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    PreMarket,
    RegularTrading,
    AfterHours,
}

/// Summary of the reference (one-minute) series the gaps are measured against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketContext {
    pub session: SessionPhase,
    pub minutes_since_open: i64,
    pub minutes_until_close: i64,
    #[serde(serialize_with = "serialize_price")]
    pub intraday_high: f64,
    #[serde(serialize_with = "serialize_price")]
    pub intraday_low: f64,
    #[serde(serialize_with = "serialize_price")]
    pub opening_price: f64,
    pub volume_today: f64,
    pub avg_volume_per_minute: f64,
    pub estimated_daily_volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapAnalysis {
    pub timestamp: DateTime<Utc>,
    #[serde(serialize_with = "serialize_price")]
    pub current_price: f64,
    pub timeframe_data: IndexMap<String, TimeframeGaps>,
    pub market_context: MarketContext,
    pub gap_statistics: IndexMap<String, GapStatistics>,
    pub nearest_gaps: NearestGaps,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FvgReport {
    pub symbol: String,
    pub status: Status,
    pub message: String,
    #[serde(flatten)]
    pub analysis: Option<GapAnalysis>,
}

impl FvgReport {
    fn failed(symbol: &str, message: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            status: Status::Error,
            message: message.into(),
            analysis: None,
        }
    }
}

/// Scans several timeframes for fair value gaps and ranks them against the current price.
pub struct FvgTool {
    provider: Arc<dyn MarketDataProvider>,
    timeframes: Vec<FvgTimeframe>,
    tracker: FairValueGapTracker,
    lookback_periods: usize,
    max_nearest: usize,
    session: OrbConfig,
}

impl FvgTool {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: &Config) -> Self {
        Self {
            provider,
            timeframes: config.fvg.timeframes.clone(),
            tracker: FairValueGapTracker::new(
                config.fvg.min_gap_percentage,
                config.fvg.lookback_periods,
            ),
            lookback_periods: config.fvg.lookback_periods,
            max_nearest: config.fvg.max_nearest,
            session: config.orb.clone(),
        }
    }

    /// The one-minute timeframe when configured, otherwise the first one.
    fn reference(&self) -> Option<&FvgTimeframe> {
        self.timeframes
            .iter()
            .find(|tf| tf.interval == REFERENCE_INTERVAL)
            .or_else(|| self.timeframes.first())
    }

    async fn fetch_latest(&self, symbol: &str, tf: &FvgTimeframe) -> Result<BarSeries, String> {
        let request = BarsRequest::latest(symbol, &tf.interval, self.lookback_periods);
        match fetch(self.provider.as_ref(), &request, &tf.key).await {
            Ok(series) if series.is_empty() => Err("No data available".to_string()),
            Ok(series) => Ok(series),
            Err(e) => Err(format!("Failed to fetch data: {}", e)),
        }
    }

    pub async fn analyze(&self, symbol: &str) -> FvgReport {
        let Some(reference_tf) = self.reference() else {
            return FvgReport::failed(symbol, "No timeframes configured");
        };
        let reference = match self.fetch_latest(symbol, reference_tf).await {
            Ok(series) => series,
            Err(reason) => {
                tracing::error!(symbol, %reason, "Reference price series unavailable");
                return FvgReport::failed(symbol, "Failed to fetch price data");
            }
        };
        let Some(latest) = reference.last().copied() else {
            return FvgReport::failed(symbol, "Failed to fetch price data");
        };
        let current_price = latest.close;
        let as_of = latest.timestamp;

        let others = join_all(
            self.timeframes
                .iter()
                .filter(|tf| tf.key != reference_tf.key)
                .map(|tf| async move { (tf.key.clone(), self.fetch_latest(symbol, tf).await) }),
        )
        .await;
        let mut fetched: IndexMap<String, Result<BarSeries, String>> = others.into_iter().collect();
        fetched.insert(reference_tf.key.clone(), Ok(reference.clone()));

        let mut timeframe_data = IndexMap::new();
        let mut gap_statistics = IndexMap::new();
        let mut failures = Vec::new();
        for tf in &self.timeframes {
            let entry = match fetched.get(&tf.key) {
                Some(Ok(series)) => {
                    let gaps = self.tracker.detect(series, &tf.key, current_price, as_of);
                    tracing::debug!(symbol, timeframe = %tf.key, gaps = gaps.len(), "Gaps detected");
                    TimeframeGaps {
                        fvg_count: gaps.len(),
                        gaps,
                        error: None,
                    }
                }
                Some(Err(reason)) => {
                    failures.push(tf.key.clone());
                    TimeframeGaps::failed(reason)
                }
                None => continue,
            };
            gap_statistics.insert(tf.key.clone(), GapStatistics::from_gaps(&entry.gaps));
            timeframe_data.insert(tf.key.clone(), entry);
        }

        let nearest = nearest_gaps(
            timeframe_data.values().flat_map(|t| t.gaps.iter()),
            current_price,
            self.max_nearest,
        );
        let market_context = match self.market_context(&reference, as_of) {
            Ok(context) => context,
            Err(e) => {
                tracing::error!(symbol, error = %e, "Cannot resolve the trading session");
                return FvgReport::failed(symbol, format!("Failed to analyze FVGs: {}", e));
            }
        };

        let (status, message) = if failures.is_empty() {
            (Status::Success, "Fair value gaps analyzed.".to_string())
        } else {
            (
                Status::PartialSuccess,
                format!("Data unavailable for timeframes: {}", failures.join(", ")),
            )
        };

        FvgReport {
            symbol: symbol.to_string(),
            status,
            message,
            analysis: Some(GapAnalysis {
                timestamp: as_of,
                current_price,
                timeframe_data,
                market_context,
                gap_statistics,
                nearest_gaps: nearest,
            }),
        }
    }

    fn market_context(&self, reference: &BarSeries, as_of: DateTime<Utc>) -> Result<MarketContext, EngineError> {
        let window = session_window(as_of, &self.session)?;
        let session = if as_of < window.open {
            SessionPhase::PreMarket
        } else if as_of <= window.close {
            SessionPhase::RegularTrading
        } else {
            SessionPhase::AfterHours
        };

        let volume_today = reference.total_volume();
        let avg_volume_per_minute = if reference.is_empty() {
            0.0
        } else {
            volume_today / reference.len() as f64
        };
        let current_price = reference.last().map(|b| b.close).unwrap_or_default();

        Ok(MarketContext {
            session,
            minutes_since_open: (as_of - window.open).num_minutes(),
            minutes_until_close: (window.close - as_of).num_minutes(),
            intraday_high: reference.max_high().unwrap_or(current_price),
            intraday_low: reference.min_low().unwrap_or(current_price),
            opening_price: reference.first().map(|b| b.open).unwrap_or(current_price),
            volume_today,
            avg_volume_per_minute,
            estimated_daily_volume: avg_volume_per_minute * REGULAR_SESSION_MINUTES,
        })
    }
}
