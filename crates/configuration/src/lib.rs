use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_logging;
pub use settings::{
    Config, FvgConfig, FvgTimeframe, Lookback, LoggingConfig, OrbConfig, ProfileConfig,
    ProviderConfig, TechnicalConfig, TimeframeConfig, Timeframes, ZonesConfig,
};

/// Environment variable consulted when `provider.api_key` is not set in the file.
pub const API_KEY_ENV: &str = "TWELVE_DATA_API_KEY";

/// Loads the application configuration.
///
/// Sources, lowest precedence first: built-in defaults, the TOML file (`path`, or an
/// optional `config.toml` in the working directory), then `CONFLUENCE__SECTION__KEY`
/// environment variables. The result is validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let file = match path {
        Some(p) => config::File::from(p).required(true),
        None => config::File::with_name("config").required(false),
    };

    let builder = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix("CONFLUENCE")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    let mut config = builder.try_deserialize::<Config>()?;

    if config.provider.api_key.is_empty() {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            config.provider.api_key = key;
        }
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_partial_file_over_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[profile]
num_bins = 30

[zones]
price_banding_width = 0.5

[orb]
periods = [5, 10]
session_open = "09:30:00"
session_close = "16:00:00"

[[timeframes]]
key = "15m"
bars_interval = "15min"
indicator_interval = "15min"
lookback = {{ days = 10 }}
intraday = true
"#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.profile.num_bins, 30);
        assert_eq!(config.zones.price_banding_width, 0.5);
        assert_eq!(config.zones.atr_period, 14);
        assert_eq!(config.orb.periods, vec![5, 10]);
        assert_eq!(config.timeframes.0.len(), 1);
        assert_eq!(config.timeframes.0[0].lookback, Lookback::Days(10));
        assert_eq!(config.fvg.lookback_periods, 500);
    }

    #[test]
    fn nested_environment_keys_override_the_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[zones]\nfibonacci_lookback = 60\n").unwrap();

        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("CONFLUENCE__ZONES__FIBONACCI_LOOKBACK", "80") };
        let config = load_config(Some(file.path()));
        unsafe { std::env::remove_var("CONFLUENCE__ZONES__FIBONACCI_LOOKBACK") };

        assert_eq!(config.unwrap().zones.fibonacci_lookback, 80);
    }

    #[test]
    fn invalid_file_values_fail_validation() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[profile]\nnum_bins = 0\n").unwrap();
        assert!(matches!(
            load_config(Some(file.path())),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
