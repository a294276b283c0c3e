use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to deserialize the API response: {0}")]
    Deserialization(String),

    #[error("Provider returned error {code}: {message}")]
    Provider { code: i64, message: String },

    #[error("Invalid data format from API: {0}")]
    InvalidData(String),

    #[error("No API key configured (set provider.api_key or TWELVE_DATA_API_KEY)")]
    MissingApiKey,

    #[error("Data source unavailable: {0}")]
    Unavailable(String),
}
