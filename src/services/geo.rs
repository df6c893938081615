//! Booking location checks: coordinate ranges, the coarse service-area
//! rectangle and the minimum pickup/drop separation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }

    /// Great-circle distance in meters.
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = (other.lat - self.lat).to_radians();
        let dlng = (other.lng - self.lng).to_radians();
        let sin_dlat = (dlat * 0.5).sin();
        let sin_dlng = (dlng * 0.5).sin();
        let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlng * sin_dlng;
        let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
        EARTH_RADIUS_M * c
    }
}

/// Which end of the trip a location error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Pickup,
    Drop,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Pickup => write!(f, "Pickup"),
            Endpoint::Drop => write!(f, "Drop"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("Invalid {} coordinates", .0.to_string().to_lowercase())]
    InvalidCoordinates(Endpoint),
    #[error("{0} location appears to be in water or outside service area")]
    OutsideServiceArea(Endpoint),
    #[error("Pickup and drop must be at least {0}m apart")]
    TooClose(u32),
    #[error("{0} address is required")]
    MissingAddress(Endpoint),
}

/// Rectangular lat/lng envelope used as a land/service-area check.
///
/// Points on the edges are inside. The rectangle accepts sea inside it and
/// rejects land outside it; it is only a plausibility filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceArea {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
    pub min_separation_m: u32,
}

impl Default for ServiceArea {
    fn default() -> Self {
        Self {
            min_lat: 8.0,
            max_lat: 35.5,
            min_lng: 68.0,
            max_lng: 97.5,
            min_separation_m: 50,
        }
    }
}

impl ServiceArea {
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.is_valid()
            && (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lng..=self.max_lng).contains(&point.lng)
    }

    pub fn are_distinct(&self, pickup: &GeoPoint, drop: &GeoPoint) -> bool {
        pickup.distance_m(drop) >= f64::from(self.min_separation_m)
    }

    /// Runs the booking checks in order and stops at the first failure.
    pub fn validate_booking(
        &self,
        pickup: &GeoPoint,
        drop: &GeoPoint,
        pickup_address: &str,
        drop_address: &str,
    ) -> Result<(), LocationError> {
        if !pickup.is_valid() {
            return Err(LocationError::InvalidCoordinates(Endpoint::Pickup));
        }
        if !drop.is_valid() {
            return Err(LocationError::InvalidCoordinates(Endpoint::Drop));
        }
        if !self.contains(pickup) {
            return Err(LocationError::OutsideServiceArea(Endpoint::Pickup));
        }
        if !self.contains(drop) {
            return Err(LocationError::OutsideServiceArea(Endpoint::Drop));
        }
        if !self.are_distinct(pickup, drop) {
            return Err(LocationError::TooClose(self.min_separation_m));
        }
        if pickup_address.trim().is_empty() {
            return Err(LocationError::MissingAddress(Endpoint::Pickup));
        }
        if drop_address.trim().is_empty() {
            return Err(LocationError::MissingAddress(Endpoint::Drop));
        }
        Ok(())
    }
}
