mod common;

use api_client::StaticProvider;
use chrono::Duration;
use common::{config_with, daily_bars, now, oscillating, timeframe};
use configuration::Lookback;
use core_types::Status;
use engine::{ProfileTool, TechnicalTool};
use std::sync::Arc;

fn provider() -> StaticProvider {
    StaticProvider::new()
        .with_bars("5min", oscillating(now(), Duration::minutes(5), 120))
        .with_bars("1day", daily_bars())
        .with_bars_failure("15min", "upstream timeout")
}

#[tokio::test]
async fn profile_tool_reports_each_timeframe_independently() {
    let config = config_with(vec![
        timeframe("5m", "5min", Lookback::Days(5), true),
        timeframe("15m", "15min", Lookback::Days(10), true),
        timeframe("1h", "1h", Lookback::Days(30), false),
    ]);
    let tool = ProfileTool::new(Arc::new(provider()), &config).unwrap();
    let report = tool.analyze("SPY", now()).await;

    let five = &report.timeframes["5m"];
    assert_eq!(five.status, Status::Success);
    assert_eq!(five.bars_analyzed, 120);
    let profile = five.volume_profile.as_ref().expect("profile computed");
    assert!(profile.value_area_low <= profile.point_of_control);
    assert!(profile.point_of_control <= profile.value_area_high);
    assert!(profile.value_area_percentage >= 70.0);

    assert_eq!(report.timeframes["15m"].status, Status::Error);
    assert!(report.timeframes["15m"].volume_profile.is_none());
    assert_eq!(report.timeframes["1h"].status, Status::Warning);

    assert_eq!(report.status, Status::Error);

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["timeframes"]["15m"].get("volume_profile").is_none());
    assert_eq!(json["timeframes"]["1h"]["message"], "No bar data available.");
}

#[tokio::test]
async fn technical_tool_marks_sections_lacking_history() {
    let config = config_with(vec![
        timeframe("5m", "5min", Lookback::Days(5), true),
        timeframe("1d", "1day", Lookback::Months(6), false),
    ]);
    let tool = TechnicalTool::new(Arc::new(provider()), &config).unwrap();
    let report = tool.analyze("SPY", now()).await;

    let five = &report.timeframes["5m"];
    assert_eq!(five.status, Status::Success);
    assert!(five.sections.trend_strength.is_some());
    assert!(five.sections.volume_momentum.is_some());
    assert!(five.sections.divergence.is_some());
    assert!(five.sections.ichimoku.is_some());

    let daily = &report.timeframes["1d"];
    assert_eq!(daily.status, Status::PartialSuccess);
    assert_eq!(
        daily.message,
        "Some indicators unavailable: trend_strength, volume_momentum, divergence, ichimoku"
    );
    assert!(daily.sections.large_volume_bars.is_some());

    assert_eq!(report.status, Status::PartialSuccess);

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["timeframes"]["5m"]["trend_strength"]["adx"].is_number());
    assert!(json["timeframes"]["1d"]["ichimoku"].is_null());
}
