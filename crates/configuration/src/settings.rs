use crate::error::ConfigError;
use chrono::{Duration, NaiveTime};
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
///
/// Every section has defaults, so an empty (or missing) `config.toml` yields a working setup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    /// Timeframes analysed by the zones, volume-profile and technical-analysis tools.
    pub timeframes: Timeframes,
    pub profile: ProfileConfig,
    pub zones: ZonesConfig,
    pub technical: TechnicalConfig,
    pub fvg: FvgConfig,
    pub orb: OrbConfig,
    pub logging: LoggingConfig,
}

/// Connection settings for the time-series data provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Falls back to the `TWELVE_DATA_API_KEY` environment variable when empty.
    pub api_key: String,
    /// Maximum number of bars requested per fetch.
    pub output_size: usize,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.twelvedata.com".to_string(),
            api_key: String::new(),
            output_size: 5000,
            timeout_secs: 30,
        }
    }
}

/// How far back bar data is requested for a timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lookback {
    Hours(u32),
    Days(u32),
    Months(u32),
}

impl Lookback {
    pub fn duration(&self) -> Duration {
        match *self {
            Lookback::Hours(h) => Duration::hours(h as i64),
            Lookback::Days(d) => Duration::days(d as i64),
            // An average month, so "6 months" spans roughly the same calendar time everywhere.
            Lookback::Months(m) => Duration::seconds((m as f64 * 30.44 * 86_400.0) as i64),
        }
    }

    pub fn describe(&self) -> String {
        match *self {
            Lookback::Hours(h) => format!("Last ~{} hours", h),
            Lookback::Days(d) => format!("Last ~{} trading days", d),
            Lookback::Months(m) => format!("Last ~{} months", m),
        }
    }
}

/// Data acquisition settings for one analysis timeframe.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimeframeConfig {
    /// The label used in results, e.g. "5m".
    pub key: String,
    /// Provider interval of the bars analysed (e.g. "5min").
    pub bars_interval: String,
    /// Provider interval used for indicator feeds such as ATR.
    pub indicator_interval: String,
    pub lookback: Lookback,
    /// Intraday timeframes additionally receive prior-day high/low levels.
    #[serde(default)]
    pub intraday: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct Timeframes(pub Vec<TimeframeConfig>);

impl Default for Timeframes {
    fn default() -> Self {
        Self(vec![
            TimeframeConfig {
                key: "1m".to_string(),
                bars_interval: "1min".to_string(),
                indicator_interval: "1min".to_string(),
                lookback: Lookback::Hours(6),
                intraday: true,
            },
            TimeframeConfig {
                key: "5m".to_string(),
                bars_interval: "5min".to_string(),
                indicator_interval: "5min".to_string(),
                lookback: Lookback::Days(5),
                intraday: true,
            },
            TimeframeConfig {
                key: "1d".to_string(),
                bars_interval: "1day".to_string(),
                indicator_interval: "1day".to_string(),
                lookback: Lookback::Months(6),
                intraday: false,
            },
        ])
    }
}

impl Timeframes {
    pub fn iter(&self) -> std::slice::Iter<'_, TimeframeConfig> {
        self.0.iter()
    }
}

/// Parameters for the volume profile.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub num_bins: usize,
    pub price_precision: u32,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            num_bins: 20,
            price_precision: 2,
        }
    }
}

/// Parameters for zone aggregation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ZonesConfig {
    /// Total width of the band drawn around VAH/VAL. Zero disables banding.
    pub price_banding_width: f64,
    pub atr_period: usize,
    pub fibonacci_lookback: usize,
}

impl Default for ZonesConfig {
    fn default() -> Self {
        Self {
            price_banding_width: 0.0,
            atr_period: 14,
            fibonacci_lookback: 50,
        }
    }
}

/// Parameters for the trend/momentum report.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TechnicalConfig {
    pub divergence_lookback: usize,
    /// A bar is "large volume" above this multiple of the mean volume.
    pub large_volume_multiplier: f64,
}

impl Default for TechnicalConfig {
    fn default() -> Self {
        Self {
            divergence_lookback: 20,
            large_volume_multiplier: 2.0,
        }
    }
}

/// One timeframe scanned for fair value gaps.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FvgTimeframe {
    pub key: String,
    pub interval: String,
}

/// Parameters for the fair value gap tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FvgConfig {
    pub timeframes: Vec<FvgTimeframe>,
    pub lookback_periods: usize,
    /// Minimum gap size as a percentage of the gap midpoint.
    pub min_gap_percentage: f64,
    /// How many gaps to report on each side of the current price.
    pub max_nearest: usize,
}

impl Default for FvgConfig {
    fn default() -> Self {
        let tf = |key: &str, interval: &str| FvgTimeframe {
            key: key.to_string(),
            interval: interval.to_string(),
        };
        Self {
            timeframes: vec![tf("1m", "1min"), tf("5m", "5min"), tf("15m", "15min")],
            lookback_periods: 500,
            min_gap_percentage: 0.1,
            max_nearest: 3,
        }
    }
}

/// Parameters for the opening range breakout tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrbConfig {
    /// Opening range lengths in minutes.
    pub periods: Vec<u32>,
    pub session_timezone: String,
    pub session_open: NaiveTime,
    pub session_close: NaiveTime,
    /// Close beyond the boundary by this percentage to count as a breakout.
    pub breakout_buffer_pct: f64,
    /// Closes beyond the boundary needed to confirm a breakout.
    pub confirmation_bars: usize,
    pub high_volume_ratio: f64,
    /// One-minute bars requested; 500 covers a full regular session.
    pub output_size: usize,
}

impl Default for OrbConfig {
    fn default() -> Self {
        Self {
            periods: vec![5, 15, 30],
            session_timezone: "America/New_York".to_string(),
            session_open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
            session_close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN),
            breakout_buffer_pct: 0.1,
            confirmation_bars: 3,
            high_volume_ratio: 1.2,
            output_size: 500,
        }
    }
}

impl OrbConfig {
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.session_timezone.parse::<Tz>().map_err(|e| {
            ConfigError::ValidationError(format!(
                "invalid session_timezone '{}': {}",
                self.session_timezone, e
            ))
        })
    }
}

/// Logging setup. `RUST_LOG` overrides `level` when set.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// When set, logs are also written to a daily-rolling file in this directory.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "confluence.log".to_string(),
        }
    }
}

impl Config {
    /// Rejects configurations the analytics cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

        if self.timeframes.0.is_empty() {
            return invalid("at least one timeframe must be configured");
        }
        let mut keys = HashSet::new();
        for tf in self.timeframes.iter() {
            if !keys.insert(tf.key.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate timeframe key '{}'",
                    tf.key
                )));
            }
        }
        if self.profile.num_bins == 0 {
            return invalid("profile.num_bins must be greater than zero");
        }
        if self.zones.price_banding_width < 0.0 {
            return invalid("zones.price_banding_width cannot be negative");
        }
        if self.zones.atr_period == 0 || self.zones.fibonacci_lookback == 0 {
            return invalid("zones.atr_period and zones.fibonacci_lookback must be positive");
        }
        if self.fvg.timeframes.is_empty() {
            return invalid("fvg.timeframes cannot be empty");
        }
        if self.fvg.min_gap_percentage < 0.0 {
            return invalid("fvg.min_gap_percentage cannot be negative");
        }
        if self.orb.periods.is_empty() || self.orb.periods.contains(&0) {
            return invalid("orb.periods must be a non-empty list of positive minutes");
        }
        if self.orb.session_open >= self.orb.session_close {
            return invalid("orb.session_open must be before orb.session_close");
        }
        self.orb.timezone()?;
        Ok(())
    }
}
