use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use sqlx::FromRow;

use crate::{
    error::AppError,
    models::{driver::DriverSummary, rating::Rating},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    Searching,
    Accepted,
    Arriving,
    Started,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub const ALL: [TripStatus; 6] = [
        TripStatus::Searching,
        TripStatus::Accepted,
        TripStatus::Arriving,
        TripStatus::Started,
        TripStatus::Completed,
        TripStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Searching => "SEARCHING",
            TripStatus::Accepted => "ACCEPTED",
            TripStatus::Arriving => "ARRIVING",
            TripStatus::Started => "STARTED",
            TripStatus::Completed => "COMPLETED",
            TripStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TripStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        TripStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| AppError::validation("Invalid status"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleType {
    Mini,
    Sedan,
    Suv,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Mini => "MINI",
            VehicleType::Sedan => "SEDAN",
            VehicleType::Suv => "SUV",
        }
    }

    /// Parses a vehicle class for quoting; unrecognised names price as MINI.
    pub fn parse_or_mini(value: &str) -> Self {
        value.parse().unwrap_or(VehicleType::Mini)
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VehicleType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "MINI" => Ok(VehicleType::Mini),
            "SEDAN" => Ok(VehicleType::Sedan),
            "SUV" => Ok(VehicleType::Suv),
            _ => Err(AppError::validation("Invalid vehicle type")),
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub rider_id: String,
    pub driver_id: Option<String>,
    pub pickup_lat: f64,
    pub pickup_lng: f64,
    pub drop_lat: f64,
    pub drop_lng: f64,
    pub pickup_address: String,
    pub drop_address: String,
    pub pickup_address_raw: Option<Value>,
    pub drop_address_raw: Option<Value>,
    pub vehicle_type: VehicleType,
    pub distance_km: f64,
    pub duration_min: f64,
    pub fare: i64,
    pub discount: i64,
    pub promo_code: Option<String>,
    pub ride_notes: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: TripStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column layout of the `trips` table; enums and JSON are stored as text.
#[derive(Debug, Clone, FromRow)]
pub struct TripRow {
    pub id: String,
    pub rider_id: String,
    pub driver_id: Option<String>,
    pub pickup_lat: f64,
    pub pickup_lng: f64,
    pub drop_lat: f64,
    pub drop_lng: f64,
    pub pickup_address: String,
    pub drop_address: String,
    pub pickup_address_raw: Option<String>,
    pub drop_address_raw: Option<String>,
    pub vehicle_type: String,
    pub distance_km: f64,
    pub duration_min: f64,
    pub fare: i64,
    pub discount: i64,
    pub promo_code: Option<String>,
    pub ride_notes: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn decode_json(raw: Option<String>) -> Result<Option<Value>, AppError> {
    raw.map(|text| serde_json::from_str(&text))
        .transpose()
        .map_err(|err| AppError::Other(err.into()))
}

impl TryFrom<TripRow> for Trip {
    type Error = AppError;

    fn try_from(row: TripRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str, value: &str| {
            AppError::Other(anyhow::anyhow!("trip {} has invalid {what}: {value}", row.id))
        };
        let status = row
            .status
            .parse()
            .map_err(|_| corrupt("status", &row.status))?;
        let vehicle_type = row
            .vehicle_type
            .parse()
            .map_err(|_| corrupt("vehicle type", &row.vehicle_type))?;

        Ok(Self {
            pickup_address_raw: decode_json(row.pickup_address_raw)?,
            drop_address_raw: decode_json(row.drop_address_raw)?,
            id: row.id,
            rider_id: row.rider_id,
            driver_id: row.driver_id,
            pickup_lat: row.pickup_lat,
            pickup_lng: row.pickup_lng,
            drop_lat: row.drop_lat,
            drop_lng: row.drop_lng,
            pickup_address: row.pickup_address,
            drop_address: row.drop_address,
            vehicle_type,
            distance_km: row.distance_km,
            duration_min: row.duration_min,
            fare: row.fare,
            discount: row.discount,
            promo_code: row.promo_code,
            ride_notes: row.ride_notes,
            scheduled_at: row.scheduled_at,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A trip as shown to its rider or driver.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TripDetails {
    #[serde(flatten)]
    pub trip: Trip,
    pub rating: Option<Rating>,
    pub driver: Option<DriverSummary>,
}
