//! Fare calculation: base fare, per-km rate by vehicle class and a
//! time-of-day multiplier.
//!
//! Formula: `total = round((base + distance_km * rate) * multiplier)`

use chrono::Timelike;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;

use crate::models::trip::VehicleType;

/// Longest trip the engine prices; well beyond any route inside the service area.
pub const MAX_DISTANCE_KM: f64 = 5_000.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FareError {
    #[error("Distance must be non-negative")]
    NegativeDistance,
    #[error("Distance must be at most 5000 km")]
    DistanceTooLarge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerKmRates {
    pub mini: f64,
    pub sedan: f64,
    pub suv: f64,
}

impl PerKmRates {
    pub fn rate_for(&self, vehicle: VehicleType) -> f64 {
        match vehicle {
            VehicleType::Mini => self.mini,
            VehicleType::Sedan => self.sedan,
            VehicleType::Suv => self.suv,
        }
    }
}

/// An hour range `[start_hour, end_hour)` in local time. A window whose end
/// is before its start wraps past midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurgeWindow {
    pub start_hour: u32,
    pub end_hour: u32,
    /// Multiplier in percent, so 115 means x1.15.
    pub multiplier_pct: u32,
    pub label: String,
}

impl SurgeWindow {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PricingConfig {
    pub base_fare: f64,
    pub per_km: PerKmRates,
    pub peak: SurgeWindow,
    pub night: SurgeWindow,
    /// Ceiling for a client-submitted fare, in percent of the server quote.
    pub client_fare_tolerance_pct: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_fare: 40.0,
            per_km: PerKmRates {
                mini: 12.0,
                sedan: 15.0,
                suv: 20.0,
            },
            peak: SurgeWindow {
                start_hour: 17,
                end_hour: 20,
                multiplier_pct: 125,
                label: "Peak hours (5PM-8PM)".into(),
            },
            night: SurgeWindow {
                start_hour: 22,
                end_hour: 6,
                multiplier_pct: 115,
                label: "Night hours (10PM-6AM)".into(),
            },
            client_fare_tolerance_pct: 110,
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FareBreakdown {
    pub base_fare: f64,
    pub distance_fare: f64,
    pub distance_km: f64,
    pub per_km_rate: f64,
    pub time_multiplier: f64,
    pub time_multiplier_label: Option<String>,
    pub surge_applied: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FareQuote {
    pub total_fare: i64,
    pub surge_applied: bool,
    pub breakdown: FareBreakdown,
}

#[derive(Debug, Clone, Default)]
pub struct FareEngine {
    config: PricingConfig,
}

impl FareEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    /// Peak wins over night when both windows match the hour.
    fn time_multiplier(&self, hour: u32) -> (u32, Option<&str>) {
        if self.config.peak.contains(hour) {
            return (self.config.peak.multiplier_pct, Some(self.config.peak.label.as_str()));
        }
        if self.config.night.contains(hour) {
            return (self.config.night.multiplier_pct, Some(self.config.night.label.as_str()));
        }
        (100, None)
    }

    pub fn calculate_fare<T: Timelike>(
        &self,
        distance_km: f64,
        vehicle: VehicleType,
        at: &T,
    ) -> Result<FareQuote, FareError> {
        if !distance_km.is_finite() || distance_km < 0.0 {
            return Err(FareError::NegativeDistance);
        }
        if distance_km > MAX_DISTANCE_KM {
            return Err(FareError::DistanceTooLarge);
        }

        let per_km_rate = self.config.per_km.rate_for(vehicle);
        let (multiplier_pct, label) = self.time_multiplier(at.hour());

        let base_fare = self.config.base_fare;
        let distance_fare = distance_km * per_km_rate;
        let subtotal = base_fare + distance_fare;
        // Scaling by an integer percentage keeps exact halves (218.5) exact.
        let total_fare = round_half_up(subtotal * f64::from(multiplier_pct) / 100.0);
        let surge_applied = multiplier_pct > 100;

        Ok(FareQuote {
            total_fare,
            surge_applied,
            breakdown: FareBreakdown {
                base_fare,
                distance_fare: (distance_fare * 100.0).round() / 100.0,
                distance_km,
                per_km_rate,
                time_multiplier: f64::from(multiplier_pct) / 100.0,
                time_multiplier_label: label.map(str::to_owned),
                surge_applied,
            },
        })
    }

    /// Largest fare a client may submit for this quote, rounded down so the
    /// stored fare never exceeds the tolerance.
    pub fn fare_ceiling(&self, quote: &FareQuote) -> i64 {
        let pct = i64::from(self.config.client_fare_tolerance_pct);
        quote.total_fare.saturating_mul(pct) / 100
    }

    /// Accepts the client fare up to the ceiling and clamps anything above.
    pub fn clamp_client_fare(&self, client_fare: f64, quote: &FareQuote) -> i64 {
        round_half_up(client_fare).min(self.fare_ceiling(quote))
    }
}

pub(crate) fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}
