use crate::error::EngineError;
use crate::session::last_trading_instant;
use crate::util::{fetch_window, rollup_message};
use analytics::{PriceBinProfiler, VolumeProfile};
use api_client::MarketDataProvider;
use chrono::{DateTime, Utc};
use configuration::{Config, TimeframeConfig};
use core_types::Status;
use futures::future::join_all;
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeframeProfile {
    pub bars_interval: String,
    pub lookback_description: String,
    pub bars_analyzed: usize,
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_profile: Option<VolumeProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileReport {
    pub symbol: String,
    pub timestamp_utc: DateTime<Utc>,
    pub status: Status,
    pub message: String,
    pub timeframes: IndexMap<String, TimeframeProfile>,
}

/// Volume profile of each configured timeframe's lookback window.
pub struct ProfileTool {
    provider: Arc<dyn MarketDataProvider>,
    timeframes: Vec<TimeframeConfig>,
    profiler: PriceBinProfiler,
    output_size: usize,
}

impl ProfileTool {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: &Config) -> Result<Self, EngineError> {
        Ok(Self {
            provider,
            timeframes: config.timeframes.0.clone(),
            profiler: PriceBinProfiler::new(config.profile.num_bins, config.profile.price_precision)?,
            output_size: config.provider.output_size,
        })
    }

    pub async fn analyze(&self, symbol: &str, now: DateTime<Utc>) -> ProfileReport {
        let as_of = last_trading_instant(now);
        let frames = join_all(self.timeframes.iter().map(|tf| self.timeframe(symbol, tf, as_of))).await;
        let timeframes: IndexMap<String, TimeframeProfile> = self
            .timeframes
            .iter()
            .map(|tf| tf.key.clone())
            .zip(frames)
            .collect();
        let status = Status::rollup(timeframes.values().map(|f| f.status));

        ProfileReport {
            symbol: symbol.to_string(),
            timestamp_utc: now,
            status,
            message: rollup_message(status, "Volume profiles"),
            timeframes,
        }
    }

    async fn timeframe(&self, symbol: &str, tf: &TimeframeConfig, as_of: DateTime<Utc>) -> TimeframeProfile {
        let fetched = fetch_window(self.provider.as_ref(), symbol, tf, as_of, self.output_size).await;
        let bars_analyzed = fetched.as_ref().map(|s| s.len()).unwrap_or(0);

        let (status, message, volume_profile) = match fetched {
            Err(e) => (Status::Error, format!("Failed to fetch bars: {}", e), None),
            Ok(series) if series.is_empty() => {
                (Status::Warning, "No bar data available.".to_string(), None)
            }
            Ok(series) => match self.profiler.profile(&series) {
                Ok(profile) => (
                    Status::Success,
                    "Volume profile computed.".to_string(),
                    Some(profile),
                ),
                Err(e) => {
                    tracing::warn!(symbol, timeframe = %tf.key, reason = %e, "Volume profile unavailable");
                    (
                        Status::PartialSuccess,
                        format!("Volume profile unavailable: {}", e),
                        None,
                    )
                }
            },
        };

        TimeframeProfile {
            bars_interval: tf.bars_interval.clone(),
            lookback_description: tf.lookback.describe(),
            bars_analyzed,
            status,
            message,
            volume_profile,
        }
    }
}
