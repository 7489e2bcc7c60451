pub mod api_client;
pub mod requests;
pub mod responses;

pub use api_client::{APIClient, ClientError, StaticToken, TokenSource};

use jiff::civil::Date;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
pub struct CarId(pub uuid::Uuid);

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
pub struct PhotoId(pub uuid::Uuid);

/// A calendar day in canonical `YYYY-MM-DD` form.
///
/// Ordering is chronological, which for this format is also the
/// lexicographic order of the string form.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(Date);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid date \"{0}\", expected YYYY-MM-DD")]
pub struct InvalidDateKey(pub String);

impl DateKey {
    pub fn new(date: Date) -> Self {
        Self(date)
    }

    pub fn date(self) -> Date {
        self.0
    }

    /// The following calendar day, or None at the end of the supported
    /// calendar.
    pub fn next_day(self) -> Option<Self> {
        self.0.tomorrow().ok().map(Self)
    }
}

impl From<Date> for DateKey {
    fn from(date: Date) -> Self {
        Self(date)
    }
}

impl FromStr for DateKey {
    type Err = InvalidDateKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The civil date parser also accepts datetimes, so pin the shape.
        let bytes = s.as_bytes();
        if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
            return Err(InvalidDateKey(s.to_string()));
        }
        s.parse::<Date>()
            .map(Self)
            .map_err(|_| InvalidDateKey(s.to_string()))
    }
}

impl TryFrom<String> for DateKey {
    type Error = InvalidDateKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DateKey> for String {
    fn from(key: DateKey) -> Self {
        key.to_string()
    }
}

impl std::fmt::Display for DateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.strftime("%Y-%m-%d"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarStatus {
    Draft,
    Active,
    Inactive,
    Paused,
    Deleted,
}

impl CarStatus {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Sedan,
    Suv,
    Hatchback,
    Coupe,
    Convertible,
    Wagon,
    Van,
    Minivan,
    Pickup,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transmission {
    Automatic,
    Manual,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelType {
    Petrol,
    Diesel,
    Hybrid,
    Electric,
    #[serde(other)]
    Other,
}

/// Amenity identifiers a host may toggle on a listing.
pub const AMENITY_CATALOG: &[&str] = &[
    "air_conditioning",
    "bluetooth",
    "usb_charger",
    "gps",
    "backup_camera",
    "child_seat",
    "sunroof",
    "cruise_control",
    "apple_carplay",
    "android_auto",
    "heated_seats",
    "roof_rack",
];

pub fn is_catalog_amenity(id: &str) -> bool {
    AMENITY_CATALOG.contains(&id)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarFeatures {
    #[serde(default)]
    pub amenities: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Availability {
    /// Malformed entries are dropped while parsing.
    #[serde(
        rename = "blockedDates",
        default,
        deserialize_with = "lenient_date_keys"
    )]
    pub blocked_dates: Vec<DateKey>,
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarRequirements {
    #[serde(default)]
    pub availability: Availability,
}

/// A host's car listing as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    pub id: CarId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub vehicle_type: Option<VehicleType>,
    #[serde(default)]
    pub transmission: Option<Transmission>,
    #[serde(default)]
    pub fuel_type: Option<FuelType>,
    #[serde(default)]
    pub seats: Option<u8>,
    #[serde(default)]
    pub price_per_day: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub pickup: Option<GeoPoint>,
    pub status: CarStatus,
    #[serde(default)]
    pub odometer_km: Option<f64>,
    #[serde(default)]
    pub features: CarFeatures,
    #[serde(default)]
    pub requirements: CarRequirements,
    #[serde(default)]
    pub image_gallery: Vec<String>,
    /// Single-image field from before galleries existed.
    #[serde(default)]
    pub image_path: Option<String>,
}

impl Car {
    /// An odometer becomes read-only once the host has set it.
    pub fn odometer_locked(&self) -> bool {
        self.odometer_km.is_some_and(|km| km > 0.0)
    }

    pub fn blocked_dates(&self) -> &[DateKey] {
        &self.requirements.availability.blocked_dates
    }

    pub fn timezone(&self) -> Option<&str> {
        self.requirements.availability.timezone.as_deref()
    }
}

/// A candidate returned by the map search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapCar {
    pub id: CarId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub vehicle_type: Option<VehicleType>,
    #[serde(default)]
    pub transmission: Option<Transmission>,
    #[serde(default)]
    pub fuel_type: Option<FuelType>,
    #[serde(default)]
    pub seats: Option<u8>,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub price_per_day: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    pub pickup: GeoPoint,
    #[serde(default)]
    pub image_url: Option<String>,
}

fn lenient_date_keys<'de, D>(deserializer: D) -> Result<Vec<DateKey>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| match value.as_str().map(str::parse::<DateKey>) {
            Some(Ok(key)) => Some(key),
            _ => {
                tracing::warn!("Dropping malformed blocked date {value}");
                None
            }
        })
        .collect())
}
