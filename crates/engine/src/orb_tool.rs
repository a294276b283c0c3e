use crate::error::EngineError;
use crate::session::session_window;
use crate::util::fetch;
use analytics::{AnalyticsError, OpeningRangeAnalyzer, OrbReport};
use api_client::{BarsRequest, MarketDataProvider};
use chrono::{DateTime, Utc};
use configuration::{Config, OrbConfig};
use core_types::precision::serialize_price_opt;
use core_types::Status;
use serde::Serialize;
use std::sync::Arc;

const ONE_MINUTE: &str = "1min";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrbToolReport {
    pub symbol: String,
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_price_opt"
    )]
    pub current_price: Option<f64>,
    #[serde(flatten)]
    pub analysis: Option<OrbReport>,
}

impl OrbToolReport {
    fn failed(symbol: &str, message: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            status: Status::Error,
            message: message.into(),
            timestamp: None,
            current_price: None,
            analysis: None,
        }
    }
}

/// Opening range breakout analysis over the latest regular session's one-minute bars.
pub struct OrbTool {
    provider: Arc<dyn MarketDataProvider>,
    analyzer: OpeningRangeAnalyzer,
    config: OrbConfig,
}

impl OrbTool {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: &Config) -> Result<Self, EngineError> {
        let orb = &config.orb;
        Ok(Self {
            provider,
            analyzer: OpeningRangeAnalyzer::new(
                orb.periods.clone(),
                orb.breakout_buffer_pct,
                orb.confirmation_bars,
                orb.high_volume_ratio,
            )?,
            config: orb.clone(),
        })
    }

    /// The session analysed is the one containing the latest bar; its close is the
    /// current price.
    pub async fn analyze(&self, symbol: &str) -> OrbToolReport {
        let request = BarsRequest::latest(symbol, ONE_MINUTE, self.config.output_size);
        let series = match fetch(self.provider.as_ref(), &request, ONE_MINUTE).await {
            Ok(series) => series,
            Err(_) => return OrbToolReport::failed(symbol, "Failed to fetch price data"),
        };
        let Some(latest) = series.last().copied() else {
            return OrbToolReport::failed(symbol, "Failed to fetch price data");
        };

        let session = match session_window(latest.timestamp, &self.config) {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(symbol, error = %e, "Cannot resolve the trading session");
                return OrbToolReport::failed(symbol, format!("Failed to calculate ORB: {}", e));
            }
        };

        match self.analyzer.analyze(&series, session, latest.close) {
            Ok(report) => {
                tracing::info!(
                    symbol,
                    bias = ?report.trading_bias.bias,
                    squeeze = report.squeeze.squeeze_detected,
                    "Opening ranges analyzed"
                );
                OrbToolReport {
                    symbol: symbol.to_string(),
                    status: Status::Success,
                    message: "Opening ranges analyzed.".to_string(),
                    timestamp: Some(latest.timestamp),
                    current_price: Some(latest.close),
                    analysis: Some(report),
                }
            }
            Err(AnalyticsError::NoSessionData) | Err(AnalyticsError::EmptySeries) => {
                tracing::warn!(symbol, "No regular trading hours bars");
                OrbToolReport::failed(symbol, "No regular trading hours data available")
            }
            Err(e) => OrbToolReport::failed(symbol, format!("Failed to calculate ORB: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_client::StaticProvider;

    #[tokio::test]
    async fn fetch_failure_is_reported_without_analysis() {
        let provider = StaticProvider::new().with_bars_failure(ONE_MINUTE, "down");
        let tool = OrbTool::new(Arc::new(provider), &Config::default()).unwrap();
        let report = tool.analyze("SPY").await;

        assert_eq!(report.status, Status::Error);
        assert_eq!(report.message, "Failed to fetch price data");
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("current_price").is_none());
        assert!(json.get("periods").is_none());
    }

    #[test]
    fn invalid_periods_are_rejected_at_construction() {
        let mut config = Config::default();
        config.orb.periods = vec![0];
        assert!(matches!(
            OrbTool::new(Arc::new(StaticProvider::new()), &config),
            Err(EngineError::Analytics(_))
        ));
    }
}
