use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub mod arch;
pub mod credential;

pub use arch::Architecture;
pub use credential::{ApiKey, CredentialError};

// --- Enums ---

/// Lifecycle status of a server as reported by the provider.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Running,
    Initializing,
    Starting,
    Stopping,
    Off,
    Deleting,
    Migrating,
    Rebuilding,
    #[serde(other)]
    Unknown,
}

impl ServerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Running => "running",
            ServerStatus::Initializing => "initializing",
            ServerStatus::Starting => "starting",
            ServerStatus::Stopping => "stopping",
            ServerStatus::Off => "off",
            ServerStatus::Deleting => "deleting",
            ServerStatus::Migrating => "migrating",
            ServerStatus::Rebuilding => "rebuilding",
            ServerStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonType {
    /// Identical cores, memory and disk.
    Same,
    /// At least one of cores, memory or disk is strictly greater.
    Better,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Running,
    Success,
    Error,
    #[serde(other)]
    Unknown,
}

// --- Catalog ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Price {
    pub net: String,
    pub gross: String,
}

/// Location-scoped price of a server type. Amounts stay decimal strings as the provider sends them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PriceQuote {
    pub location: String,
    pub price_hourly: Price,
    pub price_monthly: Price,
}

impl PriceQuote {
    pub fn monthly_gross(&self) -> Option<BigDecimal> {
        parse_amount(&self.price_monthly.gross)
    }

    pub fn hourly_gross(&self) -> Option<BigDecimal> {
        parse_amount(&self.price_hourly.gross)
    }
}

/// Parse a provider amount ("4.5100000000"). Empty or malformed strings yield `None`.
pub fn parse_amount(raw: &str) -> Option<BigDecimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    BigDecimal::from_str(raw).ok()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ServerType {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub cores: u32,
    /// GB; the provider reports fractional values for small types.
    pub memory: f64,
    /// GB
    pub disk: u64,
    #[serde(default)]
    pub prices: Vec<PriceQuote>,
}

impl ServerType {
    /// Monthly gross price of the first quote, the comparison basis for savings.
    pub fn monthly_price(&self) -> Option<BigDecimal> {
        self.prices.first().and_then(PriceQuote::monthly_gross)
    }

    pub fn hourly_price(&self) -> Option<BigDecimal> {
        self.prices.first().and_then(PriceQuote::hourly_gross)
    }

    pub fn architecture(&self) -> Architecture {
        Architecture::of(&self.name)
    }
}

// --- Servers ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Location {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Datacenter {
    pub id: u64,
    pub name: String,
    pub location: Location,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Image {
    pub id: u64,
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// A provisioned instance. Only ever replaced by a re-fetch, never patched locally.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Server {
    pub id: u64,
    pub name: String,
    pub status: ServerStatus,
    pub server_type: ServerType,
    pub datacenter: Datacenter,
    pub image: Option<Image>,
    pub created: DateTime<Utc>,
}

impl Server {
    pub fn is_off(&self) -> bool {
        self.status == ServerStatus::Off
    }

    pub fn architecture(&self) -> Architecture {
        self.server_type.architecture()
    }
}

// --- Actions ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ActionError {
    pub code: String,
    pub message: String,
}

/// Handle of an asynchronous provider action (power, change_type, rebuild).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ActionHandle {
    pub id: u64,
    pub command: String,
    pub status: ActionStatus,
    #[serde(default)]
    pub progress: u8,
    pub started: DateTime<Utc>,
    pub finished: Option<DateTime<Utc>>,
    pub error: Option<ActionError>,
}

// --- Derived ---

/// A cheaper server type for a given server. Recomputed on every catalog fetch, never stored.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CostAlternative {
    pub server_type: ServerType,
    pub monthly_savings: BigDecimal,
    pub yearly_potential_savings: BigDecimal,
    pub comparison_type: ComparisonType,
    pub architecture: Architecture,
}
