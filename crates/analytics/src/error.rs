use thiserror::Error;

/// Why a calculation could not produce a result.
///
/// None of these are fatal: callers treat them as a degraded (missing) sub-result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("Series is empty")]
    EmptySeries,

    #[error("Not enough data to perform calculation: need {required} bars, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Degenerate price range: low {low} is not below high {high}")]
    DegenerateRange { low: f64, high: f64 },

    #[error("No volume could be distributed across price bins")]
    NoVolume,

    #[error("No bars fall inside the regular session")]
    NoSessionData,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl AnalyticsError {
    pub(crate) fn require(required: usize, available: usize) -> Result<(), AnalyticsError> {
        if available < required {
            Err(AnalyticsError::InsufficientData {
                required,
                available,
            })
        } else {
            Ok(())
        }
    }
}
