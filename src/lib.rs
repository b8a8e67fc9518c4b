//! # Flight Search Library
//!
//! Collects a flight search from user input, prices it against the Sky Scrapper
//! price-calendar API and tracks the lifecycle of each search.
//!
//! The three moving parts are [`QueryBuilder`] (the editable draft),
//! [`PricingGateway`] (the single provider call) and [`SearchOrchestrator`]
//! (the `Idle -> Loading -> Success | Error` state machine).

pub mod gateway;
pub mod orchestrator;
pub mod pointer;
pub mod query;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// Re-export main types for convenience
pub use gateway::{price_calendar_params, FareProvider, GatewayConfig, PricingGateway};
pub use orchestrator::{SearchOrchestrator, SearchState, Settlement};
pub use pointer::{PanelRegion, PointerEvent, PointerEvents};
pub use query::{DateFieldKind, DateInputMode, DraftField, QueryBuilder};

/// Top-level error type for the flight search library
#[derive(Error, Debug)]
pub enum SearchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Problems with the user's draft, detected before anything is sent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please fill in all required fields: {}", field_list(.0))]
    MissingFields(Vec<DraftField>),

    #[error("Invalid cabin class: {0}")]
    InvalidCabinClass(String),
}

fn field_list(fields: &[DraftField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failures talking to the pricing provider
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Provider did not respond in time")]
    Timeout,

    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed provider response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Passenger counts per category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passengers {
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
}

impl Default for Passengers {
    fn default() -> Self {
        Self {
            adults: 1,
            children: 0,
            infants: 0,
        }
    }
}

impl Passengers {
    pub fn get(&self, category: PassengerCategory) -> u32 {
        match category {
            PassengerCategory::Adults => self.adults,
            PassengerCategory::Children => self.children,
            PassengerCategory::Infants => self.infants,
        }
    }

    pub fn get_mut(&mut self, category: PassengerCategory) -> &mut u32 {
        match category {
            PassengerCategory::Adults => &mut self.adults,
            PassengerCategory::Children => &mut self.children,
            PassengerCategory::Infants => &mut self.infants,
        }
    }

    /// Sum of all categories, widened so it cannot overflow
    pub fn total(&self) -> u64 {
        u64::from(self.adults) + u64::from(self.children) + u64::from(self.infants)
    }
}

/// Passenger category enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassengerCategory {
    Adults,
    Children,
    Infants,
}

impl PassengerCategory {
    pub const ALL: [PassengerCategory; 3] = [
        PassengerCategory::Adults,
        PassengerCategory::Children,
        PassengerCategory::Infants,
    ];

    /// Label shown next to the counter in the passenger selector
    pub fn label(&self) -> &'static str {
        match self {
            PassengerCategory::Adults => "Adults",
            PassengerCategory::Children => "Children (2-11)",
            PassengerCategory::Infants => "Infants on lap",
        }
    }
}

/// Direction of a passenger counter click
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountAdjustment {
    Increment,
    Decrement,
}

/// Cabin class enumeration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CabinClass {
    #[default]
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl CabinClass {
    pub fn label(&self) -> &'static str {
        match self {
            CabinClass::Economy => "Economy",
            CabinClass::PremiumEconomy => "Premium Economy",
            CabinClass::Business => "Business",
            CabinClass::First => "First Class",
        }
    }
}

impl fmt::Display for CabinClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CabinClass::Economy => "economy",
            CabinClass::PremiumEconomy => "premiumEconomy",
            CabinClass::Business => "business",
            CabinClass::First => "first",
        };
        f.write_str(name)
    }
}

impl FromStr for CabinClass {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "economy" => Ok(CabinClass::Economy),
            "premiumeconomy" | "premium-economy" | "premium_economy" => {
                Ok(CabinClass::PremiumEconomy)
            }
            "business" => Ok(CabinClass::Business),
            "first" => Ok(CabinClass::First),
            _ => Err(ValidationError::InvalidCabinClass(s.to_string())),
        }
    }
}

/// Validated, immutable search taken from the draft at submit time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
    pub origin: String,
    pub destination: String,
    pub departure_date: String, // YYYY-MM-DD
    pub return_date: Option<String>,
    pub passengers: Passengers,
    pub cabin_class: CabinClass,
}

/// One price point returned by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub origin: String,
    pub destination: String,
    pub price: f64,
    pub date: String,
    #[serde(rename = "link")]
    pub booking_link: String,
}

impl PriceEntry {
    /// Calendar day of the fare, when `date` starts with `YYYY-MM-DD`
    pub fn departure_day(&self) -> Option<chrono::NaiveDate> {
        let day = self.date.get(..10)?;
        chrono::NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }
}

impl fmt::Display for PriceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} → {}  ${:.2}  {}",
            self.origin, self.destination, self.price, self.date
        )
    }
}

/// One-shot search using credentials from the environment
pub async fn search_flights(query: &SearchQuery) -> Result<Vec<PriceEntry>, SearchError> {
    let gateway = PricingGateway::new(GatewayConfig::from_env()?)?;
    Ok(gateway.search(query).await?)
}
