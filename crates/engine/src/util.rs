use api_client::error::ApiError;
use api_client::{BarsRequest, MarketDataProvider};
use chrono::{DateTime, Utc};
use configuration::TimeframeConfig;
use core_types::{BarSeries, Status};

/// Fetches the configured lookback window of a timeframe, ending at `as_of`.
///
/// A hard failure is logged here so every tool reports it the same way.
pub(crate) async fn fetch_window(
    provider: &dyn MarketDataProvider,
    symbol: &str,
    timeframe: &TimeframeConfig,
    as_of: DateTime<Utc>,
    output_size: usize,
) -> Result<BarSeries, ApiError> {
    let request = BarsRequest::latest(symbol, &timeframe.bars_interval, output_size)
        .between(as_of - timeframe.lookback.duration(), as_of);
    fetch(provider, &request, &timeframe.key).await
}

/// Issues `request`, logging hard failures and empty windows against `label`.
pub(crate) async fn fetch(
    provider: &dyn MarketDataProvider,
    request: &BarsRequest,
    label: &str,
) -> Result<BarSeries, ApiError> {
    match provider.fetch_bars(request).await {
        Ok(series) => {
            if series.is_empty() {
                tracing::warn!(
                    symbol = %request.symbol,
                    timeframe = label,
                    interval = %request.interval,
                    "No bar data for the requested window"
                );
            }
            Ok(series)
        }
        Err(e) => {
            tracing::error!(
                symbol = %request.symbol,
                timeframe = label,
                interval = %request.interval,
                error = %e,
                "Bar fetch failed"
            );
            Err(e)
        }
    }
}

/// The overall message shared by the per-timeframe tools.
pub(crate) fn rollup_message(status: Status, subject: &str) -> String {
    match status {
        Status::Success => "All timeframes processed successfully.".to_string(),
        Status::PartialSuccess => format!(
            "{} generated for some timeframes or some data/calculations failed. Check timeframe statuses.",
            subject
        ),
        Status::Warning => format!("No {} processed for any timeframe.", subject.to_lowercase()),
        Status::Error => "Critical errors occurred fetching/processing data for one or more timeframes. Check timeframe statuses.".to_string(),
    }
}
