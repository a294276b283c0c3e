use crate::error::EngineError;
use crate::session::last_trading_instant;
use crate::util::{fetch_window, rollup_message};
use analytics::trend::{Divergence, Ichimoku, LargeVolumeBar, TrendStrength, VolumeMomentum};
use analytics::{AnalyticsError, TrendMomentumAnalyzer};
use api_client::MarketDataProvider;
use chrono::{DateTime, Utc};
use configuration::{Config, TimeframeConfig};
use core_types::{BarSeries, Status};
use futures::future::join_all;
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;

/// The indicator sections of one timeframe. A section is absent when its calculation had
/// too little data.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndicatorSections {
    pub trend_strength: Option<TrendStrength>,
    pub volume_momentum: Option<VolumeMomentum>,
    pub divergence: Option<Divergence>,
    pub ichimoku: Option<Ichimoku>,
    pub large_volume_bars: Option<Vec<LargeVolumeBar>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeframeIndicators {
    pub bars_interval: String,
    pub bars_analyzed: usize,
    pub status: Status,
    pub message: String,
    #[serde(flatten)]
    pub sections: IndicatorSections,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnicalReport {
    pub symbol: String,
    pub timestamp_utc: DateTime<Utc>,
    pub status: Status,
    pub message: String,
    pub timeframes: IndexMap<String, TimeframeIndicators>,
}

/// Trend, momentum, divergence and Ichimoku readings per configured timeframe.
pub struct TechnicalTool {
    provider: Arc<dyn MarketDataProvider>,
    timeframes: Vec<TimeframeConfig>,
    analyzer: TrendMomentumAnalyzer,
    output_size: usize,
}

impl TechnicalTool {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: &Config) -> Result<Self, EngineError> {
        Ok(Self {
            provider,
            timeframes: config.timeframes.0.clone(),
            analyzer: TrendMomentumAnalyzer::new(
                config.technical.divergence_lookback,
                config.technical.large_volume_multiplier,
            )?,
            output_size: config.provider.output_size,
        })
    }

    pub async fn analyze(&self, symbol: &str, now: DateTime<Utc>) -> TechnicalReport {
        let as_of = last_trading_instant(now);
        let frames = join_all(self.timeframes.iter().map(|tf| self.timeframe(symbol, tf, as_of))).await;
        let timeframes: IndexMap<String, TimeframeIndicators> = self
            .timeframes
            .iter()
            .map(|tf| tf.key.clone())
            .zip(frames)
            .collect();
        let status = Status::rollup(timeframes.values().map(|f| f.status));

        TechnicalReport {
            symbol: symbol.to_string(),
            timestamp_utc: now,
            status,
            message: rollup_message(status, "Technical indicators"),
            timeframes,
        }
    }

    async fn timeframe(&self, symbol: &str, tf: &TimeframeConfig, as_of: DateTime<Utc>) -> TimeframeIndicators {
        let fetched = fetch_window(self.provider.as_ref(), symbol, tf, as_of, self.output_size).await;
        let frame = |bars_analyzed, status, message: String, sections| TimeframeIndicators {
            bars_interval: tf.bars_interval.clone(),
            bars_analyzed,
            status,
            message,
            sections,
        };

        match fetched {
            Err(e) => frame(
                0,
                Status::Error,
                format!("Failed to fetch bars: {}", e),
                IndicatorSections::default(),
            ),
            Ok(series) if series.is_empty() => frame(
                0,
                Status::Warning,
                "No bar data available.".to_string(),
                IndicatorSections::default(),
            ),
            Ok(series) => {
                let (sections, missing) = self.sections(&tf.key, &series);
                let (status, message) = sections_status(&missing);
                frame(series.len(), status, message, sections)
            }
        }
    }

    fn sections(&self, timeframe: &str, series: &BarSeries) -> (IndicatorSections, Vec<&'static str>) {
        let mut missing = Vec::new();
        let sections = IndicatorSections {
            trend_strength: keep(timeframe, "trend_strength", self.analyzer.trend_strength(series), &mut missing),
            volume_momentum: keep(timeframe, "volume_momentum", self.analyzer.volume_momentum(series), &mut missing),
            divergence: keep(timeframe, "divergence", self.analyzer.divergence(series), &mut missing),
            ichimoku: keep(timeframe, "ichimoku", self.analyzer.ichimoku(series), &mut missing),
            large_volume_bars: keep(
                timeframe,
                "large_volume_bars",
                self.analyzer.large_volume_bars(series),
                &mut missing,
            ),
        };
        (sections, missing)
    }
}

/// Turns an unavailable section into `None`, recording its name.
fn keep<T>(
    timeframe: &str,
    name: &'static str,
    result: Result<T, AnalyticsError>,
    missing: &mut Vec<&'static str>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(timeframe, section = name, reason = %e, "Indicator section unavailable");
            missing.push(name);
            None
        }
    }
}

const SECTION_COUNT: usize = 5;

fn sections_status(missing: &[&str]) -> (Status, String) {
    match missing.len() {
        0 => (Status::Success, "All indicators computed.".to_string()),
        SECTION_COUNT => (
            Status::Warning,
            "Not enough bars for any indicator.".to_string(),
        ),
        _ => (
            Status::PartialSuccess,
            format!("Some indicators unavailable: {}", missing.join(", ")),
        ),
    }
}
