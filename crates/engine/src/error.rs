use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] configuration::error::ConfigError),

    #[error("Invalid analysis parameters: {0}")]
    Analytics(#[from] analytics::AnalyticsError),

    #[error("API client error: {0}")]
    ApiClient(#[from] api_client::error::ApiError),

    #[error("Session time {time} does not exist on {date} in {timezone}")]
    Session {
        date: chrono::NaiveDate,
        time: chrono::NaiveTime,
        timezone: String,
    },

    #[error("Serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}
