//! City-level geolocation record.
//!
//! Owned mirror of the GeoLite2-City record layout. Every field is
//! optional because databases omit whatever they do not know.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Localized names keyed by language code ("en", "de", ...).
pub type Names = BTreeMap<String, String>;

/// Result of a successful lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoRecord {
    /// Address that was looked up, filled in by the service
    #[serde(default)]
    pub ip: String,

    /// City the address resolves to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<City>,

    /// Continent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continent: Option<Continent>,

    /// Country the address is located in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<Country>,

    /// Country the network is registered to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_country: Option<Country>,

    /// Coordinates and time zone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    /// Postal code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal: Option<Postal>,

    /// Subdivisions, largest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subdivisions: Vec<Subdivision>,
}

impl GeoRecord {
    /// English city name, if known.
    pub fn city_name(&self) -> Option<&str> {
        self.city.as_ref()?.names.get("en").map(String::as_str)
    }

    /// ISO 3166-1 country code, if known.
    pub fn country_code(&self) -> Option<&str> {
        self.country.as_ref()?.iso_code.as_deref()
    }
}

/// City entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    /// GeoNames identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geoname_id: Option<u32>,
    /// Localized names
    #[serde(default)]
    pub names: Names,
}

/// Continent entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Continent {
    /// Two-letter code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// GeoNames identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geoname_id: Option<u32>,
    /// Localized names
    #[serde(default)]
    pub names: Names,
}

/// Country entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    /// GeoNames identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geoname_id: Option<u32>,
    /// EU membership
    #[serde(default)]
    pub is_in_european_union: bool,
    /// ISO code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso_code: Option<String>,
    /// Localized names
    #[serde(default)]
    pub names: Names,
}

/// Approximate location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Accuracy radius in kilometers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_radius: Option<u16>,
    /// Latitude
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Longitude
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// US metro code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metro_code: Option<u16>,
    /// IANA time zone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

/// Postal code entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Postal {
    /// Postal code, possibly truncated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Region, state or province.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subdivision {
    /// GeoNames identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geoname_id: Option<u32>,
    /// ISO code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso_code: Option<String>,
    /// Localized names
    #[serde(default)]
    pub names: Names,
}
