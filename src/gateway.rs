//! HTTP gateway to the Sky Scrapper price-calendar endpoint

use crate::{GatewayError, PriceEntry, SearchError, SearchQuery};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

pub const DEFAULT_BASE_URL: &str = "https://sky-scrapper.p.rapidapi.com";
pub const DEFAULT_API_HOST: &str = "sky-scrapper.p.rapidapi.com";
pub const DEFAULT_CURRENCY: &str = "USD";
const PRICE_CALENDAR_PATH: &str = "/api/v1/flights/getPriceCalendar";

const API_KEY_VAR: &str = "SKY_SCRAPPER_API_KEY";
const BASE_URL_VAR: &str = "SKY_SCRAPPER_BASE_URL";

/// Anything that can price a validated query
#[async_trait]
pub trait FareProvider: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<PriceEntry>, GatewayError>;
}

/// Connection settings and credentials for the provider
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_host: String,
    pub api_key: String,
    pub currency: String,
    /// `None` leaves the transport's default in place
    pub timeout: Option<Duration>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_host: DEFAULT_API_HOST.to_string(),
            api_key: String::new(),
            currency: DEFAULT_CURRENCY.to_string(),
            timeout: None,
        }
    }
}

impl GatewayConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Read credentials from `SKY_SCRAPPER_API_KEY` (and optionally `SKY_SCRAPPER_BASE_URL`)
    pub fn from_env() -> Result<Self, SearchError> {
        let api_key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| SearchError::Config(format!("{} is not set", API_KEY_VAR)))?;

        let mut config = Self::with_api_key(api_key);
        if let Ok(base_url) = std::env::var(BASE_URL_VAR) {
            config.base_url = base_url;
        }
        Ok(config)
    }
}

/// Query parameters for one price-calendar request.
///
/// A one-way search still sends `toDate`, as an empty string.
pub fn price_calendar_params(query: &SearchQuery, currency: &str) -> Vec<(&'static str, String)> {
    vec![
        ("originSkyId", query.origin.clone()),
        ("destinationSkyId", query.destination.clone()),
        ("fromDate", query.departure_date.clone()),
        ("toDate", query.return_date.clone().unwrap_or_default()),
        ("currency", currency.to_string()),
    ]
}

/// Client for the pricing provider. One HTTP call per search, no retries.
pub struct PricingGateway {
    http_client: Client,
    config: GatewayConfig,
}

impl PricingGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        debug!(base_url = %config.base_url, "Creating pricing gateway");
        let user_agent = concat!("flight-search/", env!("CARGO_PKG_VERSION"));
        let mut builder = Client::builder().user_agent(user_agent);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        Ok(Self { http_client, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    #[instrument(
        level = "info",
        skip(self, query),
        fields(origin = %query.origin, destination = %query.destination)
    )]
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<PriceEntry>, GatewayError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), PRICE_CALENDAR_PATH);
        let params = price_calendar_params(query, &self.config.currency);
        info!(url = %url, from_date = %query.departure_date, "Requesting price calendar");

        let start_time = std::time::Instant::now();
        let response = self
            .http_client
            .get(&url)
            .query(&params)
            .header("X-RapidAPI-Host", &self.config.api_host)
            .header("X-RapidAPI-Key", &self.config.api_key)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();

        info!(
            status = %status,
            duration_ms = start_time.elapsed().as_millis(),
            "HTTP request completed"
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, "Provider rejected price calendar request");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(transport_error)?;
        let entries = parse_price_calendar(&body)?;
        info!(entries = entries.len(), "Price calendar normalized");
        Ok(entries)
    }
}

#[async_trait]
impl FareProvider for PricingGateway {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<PriceEntry>, GatewayError> {
        PricingGateway::search(self, query).await
    }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        warn!("Price calendar request timed out");
        GatewayError::Timeout
    } else {
        GatewayError::Transport(err)
    }
}

/// Turn a provider body into price entries.
///
/// Only a body that is not JSON is an error. A `data` field that is missing,
/// `null` or not an array means no fares; array items that do not decode as a
/// price entry, or carry a negative price, are skipped.
pub(crate) fn parse_price_calendar(body: &str) -> Result<Vec<PriceEntry>, GatewayError> {
    let response: Value = serde_json::from_str(body)?;
    let items = match response.get("data") {
        Some(Value::Array(items)) => items,
        None | Some(Value::Null) => {
            debug!("Provider response carried no data field");
            return Ok(Vec::new());
        }
        Some(other) => {
            warn!(kind = json_kind(other), "Provider data field is not a list of prices");
            return Ok(Vec::new());
        }
    };

    let mut entries = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match PriceEntry::deserialize(item) {
            Ok(entry) if entry.price.is_finite() && entry.price >= 0.0 => entries.push(entry),
            Ok(entry) => {
                warn!(index, price = entry.price, "Dropped price entry with invalid price")
            }
            Err(e) => warn!(index, error = %e, "Dropped undecodable price entry"),
        }
    }
    Ok(entries)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CabinClass, Passengers};

    fn query(return_date: Option<&str>) -> SearchQuery {
        SearchQuery {
            origin: "BOM".to_string(),
            destination: "JFK".to_string(),
            departure_date: "2024-06-01".to_string(),
            return_date: return_date.map(str::to_string),
            passengers: Passengers::default(),
            cabin_class: CabinClass::Economy,
        }
    }

    #[test]
    fn test_one_way_sends_empty_to_date() {
        let params = price_calendar_params(&query(None), "USD");
        assert_eq!(
            params,
            vec![
                ("originSkyId", "BOM".to_string()),
                ("destinationSkyId", "JFK".to_string()),
                ("fromDate", "2024-06-01".to_string()),
                ("toDate", String::new()),
                ("currency", "USD".to_string()),
            ]
        );
    }

    #[test]
    fn test_round_trip_sends_to_date() {
        let params = price_calendar_params(&query(Some("2024-06-10")), "EUR");
        assert!(params.contains(&("toDate", "2024-06-10".to_string())));
        assert!(params.contains(&("currency", "EUR".to_string())));
    }

    #[test]
    fn test_parse_missing_or_null_data_is_empty() {
        assert!(parse_price_calendar(r#"{"status": true}"#).unwrap().is_empty());
        assert!(parse_price_calendar(r#"{"status": true, "data": null}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_keeps_provider_order_and_drops_negative_prices() {
        let body = r#"{"data": [
            {"origin":"BOM","destination":"JFK","price":700.0,
             "date":"2024-06-02","link":"https://b/2"},
            {"origin":"BOM","destination":"JFK","price":-1,
             "date":"2024-06-03","link":"https://b/3"},
            {"origin":"BOM","destination":"JFK","price":650.25,
             "date":"2024-06-01","link":"https://b/1"}
        ]}"#;
        let entries = parse_price_calendar(body).unwrap();
        let dates: Vec<&str> = entries.iter().map(|e| e.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-06-02", "2024-06-01"]);
    }

    #[test]
    fn test_parse_non_list_data_is_empty() {
        let body = r#"{"status": true, "data": {"flights": {"days": []}}}"#;
        assert!(parse_price_calendar(body).unwrap().is_empty());
        assert!(parse_price_calendar(r#"{"data": "none"}"#).unwrap().is_empty());
        assert!(parse_price_calendar("[1, 2]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_skips_incomplete_entries() {
        let body = r#"{"data": [
            {"origin":"BOM","destination":"JFK","price":410.0,"date":"2024-06-01"},
            {"origin":"BOM","destination":"JFK","price":null,
             "date":"2024-06-02","link":"https://b/2"},
            {"origin":"BOM","destination":"JFK","price":385.5,
             "date":"2024-06-03","link":"https://b/3"},
            "not an entry"
        ]}"#;
        let entries = parse_price_calendar(body).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].booking_link, "https://b/3");
    }

    #[test]
    fn test_parse_non_json_body_is_decode_error() {
        assert!(matches!(parse_price_calendar("<html>"), Err(GatewayError::Decode(_))));
        assert!(matches!(parse_price_calendar(""), Err(GatewayError::Decode(_))));
    }

    #[test]
    fn test_gateway_creation() {
        let gateway = PricingGateway::new(GatewayConfig::with_api_key("test-key"));
        assert!(gateway.is_ok());
        let gateway = gateway.unwrap();
        assert_eq!(gateway.config().currency, "USD");
        assert_eq!(gateway.config().api_host, DEFAULT_API_HOST);
    }
}
