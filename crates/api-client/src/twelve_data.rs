use crate::error::ApiError;
use crate::{AtrPoint, BarsRequest, MarketDataProvider};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use configuration::ProviderConfig;
use core_types::{Bar, BarSeries};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Twelve Data reports "no data for this window" as a 400 with this message prefix.
const NO_DATA_CODE: i64 = 400;
const NO_DATA_MESSAGE: &str = "No data is available";

/// A concrete implementation of the `MarketDataProvider` for the Twelve Data REST API.
#[derive(Clone)]
pub struct TwelveDataClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TwelveDataClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ApiError> {
        if config.api_key.is_empty() {
            return Err(ApiError::MissingApiKey);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Issues a GET and returns the `values` array, or an empty list when the provider
    /// reports that the window holds no data.
    async fn get_values<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, ApiError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("timezone", "UTC"), ("apikey", self.api_key.as_str())])
            .send()
            .await?;
        let text = response.text().await?;
        parse_envelope(&text)
    }
}

// Intermediate structs for deserializing Twelve Data responses.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Values { values: Vec<T> },
    Failure { code: i64, message: String },
}

#[derive(Deserialize)]
struct RawBar {
    datetime: String,
    open: String,
    high: String,
    low: String,
    close: String,
    // Absent for instruments without volume (e.g. forex).
    #[serde(default)]
    volume: Option<String>,
}

#[derive(Deserialize)]
struct RawAtr {
    datetime: String,
    atr: String,
}

fn parse_envelope<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, ApiError> {
    match serde_json::from_str::<Envelope<T>>(text) {
        Ok(Envelope::Values { values }) => Ok(values),
        Ok(Envelope::Failure { code, message })
            if code == NO_DATA_CODE && message.starts_with(NO_DATA_MESSAGE) =>
        {
            tracing::debug!(%message, "Provider has no data for the requested window");
            Ok(Vec::new())
        }
        Ok(Envelope::Failure { code, message }) => Err(ApiError::Provider { code, message }),
        Err(e) => Err(ApiError::Deserialization(format!(
            "{}. Original text: {}",
            e, text
        ))),
    }
}

/// Parses intraday (`2024-01-02 09:30:00`) and daily (`2024-01-02`) timestamps as UTC.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    NaiveDateTime::parse_from_str(raw, DATE_TIME_FORMAT)
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .map(|naive| naive.and_utc())
        .map_err(|e| ApiError::InvalidData(format!("Invalid datetime '{}': {}", raw, e)))
}

fn parse_number(field: &str, raw: &str) -> Result<f64, ApiError> {
    raw.parse::<f64>()
        .map_err(|e| ApiError::InvalidData(format!("Invalid {} '{}': {}", field, raw, e)))
}

fn to_series(raw: Vec<RawBar>) -> Result<BarSeries, ApiError> {
    let bars = raw
        .into_iter()
        .map(|r| {
            Ok(Bar::new(
                parse_timestamp(&r.datetime)?,
                parse_number("open", &r.open)?,
                parse_number("high", &r.high)?,
                parse_number("low", &r.low)?,
                parse_number("close", &r.close)?,
                r.volume
                    .as_deref()
                    .map(|v| parse_number("volume", v))
                    .transpose()?
                    .unwrap_or(0.0),
            ))
        })
        .collect::<Result<Vec<Bar>, ApiError>>()?;

    // Values arrive newest first.
    BarSeries::from_unordered(bars).map_err(|e| ApiError::InvalidData(e.to_string()))
}

#[async_trait]
impl MarketDataProvider for TwelveDataClient {
    async fn fetch_bars(&self, request: &BarsRequest) -> Result<BarSeries, ApiError> {
        let mut params = vec![
            ("symbol", request.symbol.clone()),
            ("interval", request.interval.clone()),
            ("outputsize", request.output_size.to_string()),
        ];
        if let Some(start) = request.start {
            params.push(("start_date", start.format(DATE_TIME_FORMAT).to_string()));
        }
        if let Some(end) = request.end {
            params.push(("end_date", end.format(DATE_TIME_FORMAT).to_string()));
        }

        let raw: Vec<RawBar> = self.get_values("time_series", &params).await?;
        let series = to_series(raw)?;
        tracing::debug!(
            symbol = %request.symbol,
            interval = %request.interval,
            bars = series.len(),
            "Fetched time series"
        );
        Ok(series)
    }

    async fn fetch_atr(
        &self,
        symbol: &str,
        interval: &str,
        period: usize,
    ) -> Result<Vec<AtrPoint>, ApiError> {
        let params = [
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
            ("time_period", period.to_string()),
        ];
        let raw: Vec<RawAtr> = self.get_values("atr", &params).await?;

        let mut points = raw
            .into_iter()
            .map(|r| {
                Ok(AtrPoint {
                    timestamp: parse_timestamp(&r.datetime)?,
                    atr: r.atr,
                })
            })
            .collect::<Result<Vec<AtrPoint>, ApiError>>()?;
        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }
}
