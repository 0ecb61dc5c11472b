//! Turn a device position into address fields for the booking form.
//!
//! Positions come from the client; [`LocationService`] reverse-geocodes them
//! and keeps recent answers for a few minutes so repeated taps on "use my
//! location" do not hit the geocoder again.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::AddressDetails;

pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
pub const MAX_CACHED_AGE: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/reverse";

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Coordinates are out of range")]
    InvalidCoordinates,

    #[error("Location lookup timed out")]
    Timeout,

    #[error("Could not look up the address for this location: {0}")]
    Geocoding(String),

    #[error("No address was found for this location")]
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, LocationError> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        if valid {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(LocationError::InvalidCoordinates)
        }
    }

    /// Cache key at roughly 10 m resolution
    fn cache_key(&self) -> (i64, i64) {
        (
            (self.latitude * 10_000.0).round() as i64,
            (self.longitude * 10_000.0).round() as i64,
        )
    }
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, coordinates: Coordinates) -> Result<AddressDetails, LocationError>;
}

/// Reverse geocoding against a Nominatim-compatible endpoint
pub struct NominatimGeocoder {
    client: reqwest::Client,
    url: String,
}

impl NominatimGeocoder {
    pub fn new(url: impl Into<String>) -> Result<Self, LocationError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("booking-service/", env!("CARGO_PKG_VERSION")))
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .map_err(|e| LocationError::Geocoding(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NominatimAddress {
    house_number: Option<String>,
    road: Option<String>,
    suburb: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    state: Option<String>,
    postcode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(&self, coordinates: Coordinates) -> Result<AddressDetails, LocationError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("addressdetails", "1".to_string()),
                ("lat", coordinates.latitude.to_string()),
                ("lon", coordinates.longitude.to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LocationError::Timeout
                } else {
                    LocationError::Geocoding(e.to_string())
                }
            })?
            .error_for_status()
            .map_err(|e| LocationError::Geocoding(e.to_string()))?;

        let body: NominatimResponse = response
            .json()
            .await
            .map_err(|e| LocationError::Geocoding(e.to_string()))?;
        body.address
            .map(address_from_nominatim)
            .ok_or(LocationError::NotFound)
    }
}

pub fn address_from_nominatim(address: NominatimAddress) -> AddressDetails {
    let street = [address.house_number, address.road]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    let city = address
        .city
        .or(address.town)
        .or(address.village)
        .or(address.suburb)
        .unwrap_or_default();
    let state = address
        .state
        .map(|state| state_abbreviation(&state).map_or(state.clone(), str::to_string))
        .unwrap_or_default();

    AddressDetails {
        house_details: String::new(),
        address: street,
        city,
        state,
        pincode: address.postcode.unwrap_or_default(),
    }
}

/// Australian state/territory code for a full name, e.g. `New South Wales` → `NSW`
pub fn state_abbreviation(name: &str) -> Option<&'static str> {
    let code = match name.trim().to_lowercase().as_str() {
        "new south wales" => "NSW",
        "victoria" => "VIC",
        "queensland" => "QLD",
        "western australia" => "WA",
        "south australia" => "SA",
        "tasmania" => "TAS",
        "australian capital territory" => "ACT",
        "northern territory" => "NT",
        _ => return None,
    };
    Some(code)
}

struct CachedAddress {
    address: AddressDetails,
    resolved_at: Instant,
}

pub struct LocationService {
    geocoder: std::sync::Arc<dyn ReverseGeocoder>,
    timeout: Duration,
    max_age: Duration,
    cache: DashMap<(i64, i64), CachedAddress>,
}

impl LocationService {
    pub fn new(geocoder: std::sync::Arc<dyn ReverseGeocoder>) -> Self {
        Self {
            geocoder,
            timeout: LOOKUP_TIMEOUT,
            max_age: MAX_CACHED_AGE,
            cache: DashMap::new(),
        }
    }

    /// Address fields for a position. House details are never known and come
    /// back empty.
    pub async fn address_at(&self, coordinates: Coordinates) -> Result<AddressDetails, LocationError> {
        let key = coordinates.cache_key();
        if let Some(cached) = self.cache.get(&key) {
            if cached.resolved_at.elapsed() <= self.max_age {
                debug!(?coordinates, "reusing recent reverse-geocoding result");
                return Ok(cached.address.clone());
            }
        }

        let address = tokio::time::timeout(self.timeout, self.geocoder.reverse(coordinates))
            .await
            .map_err(|_| LocationError::Timeout)??;
        info!(city = %address.city, state = %address.state, "resolved address from location");

        self.cache.insert(
            key,
            CachedAddress {
                address: address.clone(),
                resolved_at: Instant::now(),
            },
        );
        Ok(address)
    }
}

/// Copy geocoded fields over the draft's address, keeping what the geocoder
/// could not supply.
pub fn merge_located_address(current: &mut AddressDetails, located: AddressDetails) {
    let fields = [
        (&mut current.address, located.address),
        (&mut current.city, located.city),
        (&mut current.state, located.state),
        (&mut current.pincode, located.pincode),
    ];
    for (target, value) in fields {
        if !value.trim().is_empty() {
            *target = value;
        }
    }
}
