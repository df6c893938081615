use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use sqlx::FromRow;

use crate::models::trip::VehicleType;

#[derive(Debug, Clone, FromRow)]
pub struct DriverProfileRow {
    pub user_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub vehicle_type: String,
    pub vehicle_number: String,
    pub license_number: String,
    pub is_online: bool,
    pub rating: f64,
    pub rating_count: i64,
    pub rating_sum: i64,
    pub created_at: DateTime<Utc>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverProfile {
    pub user_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub vehicle_type: VehicleType,
    pub vehicle_number: String,
    pub license_number: String,
    pub is_online: bool,
    pub rating: f64,
    pub rating_count: i64,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DriverProfileRow> for DriverProfile {
    type Error = crate::error::AppError;

    fn try_from(row: DriverProfileRow) -> Result<Self, Self::Error> {
        Ok(Self {
            vehicle_type: row.vehicle_type.parse()?,
            user_id: row.user_id,
            name: row.name,
            phone: row.phone,
            vehicle_number: row.vehicle_number,
            license_number: row.license_number,
            is_online: row.is_online,
            rating: row.rating,
            rating_count: row.rating_count,
            created_at: row.created_at,
        })
    }
}

/// What a rider gets to see about the assigned driver.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverSummary {
    pub name: String,
    pub vehicle_type: VehicleType,
    pub vehicle_number: String,
    pub rating: f64,
}

impl From<&DriverProfile> for DriverSummary {
    fn from(profile: &DriverProfile) -> Self {
        Self {
            name: profile.name.clone(),
            vehicle_type: profile.vehicle_type,
            vehicle_number: profile.vehicle_number.clone(),
            rating: profile.rating,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDriverProfile {
    pub name: String,
    pub phone: Option<String>,
    pub vehicle_type: VehicleType,
    pub vehicle_number: String,
    pub license_number: String,
}
