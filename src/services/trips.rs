use std::sync::Arc;

use chrono::{DateTime, Local, Timelike, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::RideConfig,
    db::DbPool,
    error::AppError,
    models::{
        driver::{DriverProfile, DriverProfileRow, DriverSummary, NewDriverProfile},
        rating::{validate_stars, Rating},
        trip::{Trip, TripDetails, TripRow, TripStatus, VehicleType},
        user::{Actor, Role},
    },
    services::{
        geo::{GeoPoint, ServiceArea},
        lifecycle::TransitionTable,
        pricing::{FareEngine, FareQuote},
        promo::{apply_discount, normalize_code, PromoCatalog, PromoResult},
        sanitize::{normalize_optional, sanitize_address, MAX_RIDE_NOTES_LENGTH},
    },
};

const RIDER_TRIPS_LIMIT: i64 = 50;
const DRIVER_TRIPS_LIMIT: i64 = 50;
const AVAILABLE_TRIPS_LIMIT: i64 = 20;

const TRIP_NOT_FOUND: &str = "Trip not found";
const TRIP_NOT_AVAILABLE: &str = "Trip not available or already accepted";
const DRIVER_PROFILE_NOT_FOUND: &str = "Driver profile not found";

/// A booking as submitted by the rider's client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTrip {
    pub pickup_lat: f64,
    pub pickup_lng: f64,
    pub drop_lat: f64,
    pub drop_lng: f64,
    pub pickup_address: String,
    pub drop_address: String,
    #[serde(default)]
    pub pickup_address_raw: Option<Value>,
    #[serde(default)]
    pub drop_address_raw: Option<Value>,
    pub distance_km: f64,
    pub duration_min: f64,
    /// Fare shown to the rider; only trusted up to the server ceiling.
    pub fare: f64,
    pub vehicle_type: String,
    #[serde(default)]
    pub ride_notes: Option<String>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub promo_code: Option<String>,
}

struct Rules {
    fares: FareEngine,
    area: ServiceArea,
    promos: PromoCatalog,
    transitions: TransitionTable,
}

#[derive(Clone)]
pub struct TripService {
    db: DbPool,
    rules: Arc<Rules>,
}

fn require_driver(actor: &Actor) -> Result<(), AppError> {
    match actor.role {
        Role::Driver => Ok(()),
        Role::Rider => Err(AppError::forbidden("Driver access only")),
    }
}

fn require_non_negative(value: f64, field: &str) -> Result<f64, AppError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(AppError::validation(format!("{field} must be non-negative")))
    }
}

/// Raw address components must be a JSON object; `null` means absent.
fn address_components(raw: Option<Value>, field: &str) -> Result<Option<Value>, AppError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(value @ Value::Object(_)) => Ok(Some(value)),
        Some(_) => Err(AppError::validation(format!("{field} must be an object"))),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

impl TripService {
    pub fn new(db: DbPool, config: RideConfig) -> Self {
        Self {
            db,
            rules: Arc::new(Rules {
                fares: FareEngine::new(config.pricing),
                area: config.service_area,
                promos: config.promos,
                transitions: TransitionTable::default(),
            }),
        }
    }

    pub fn quote<T: Timelike>(
        &self,
        distance_km: f64,
        vehicle: VehicleType,
        at: &T,
    ) -> Result<FareQuote, AppError> {
        Ok(self.rules.fares.calculate_fare(distance_km, vehicle, at)?)
    }

    pub fn validate_promo(&self, code: &str) -> PromoResult {
        self.rules.promos.validate_promo_code(code)
    }

    pub async fn create_trip(&self, actor: &Actor, request: CreateTrip) -> Result<Trip, AppError> {
        self.create_trip_at(actor, request, &Local::now()).await
    }

    /// Validates and prices a booking, then stores it as SEARCHING.
    /// `priced_at` supplies the local hour used for surge pricing.
    pub async fn create_trip_at<T: Timelike>(
        &self,
        actor: &Actor,
        request: CreateTrip,
        priced_at: &T,
    ) -> Result<Trip, AppError> {
        if actor.role != Role::Rider {
            return Err(AppError::forbidden("Only riders can book trips"));
        }

        let distance_km = require_non_negative(request.distance_km, "Distance")?;
        let duration_min = require_non_negative(request.duration_min, "Duration")?;
        let client_fare = require_non_negative(request.fare, "Fare")?;
        let vehicle_type: VehicleType = request.vehicle_type.parse()?;
        let pickup_address_raw = address_components(request.pickup_address_raw, "pickupAddressRaw")?;
        let drop_address_raw = address_components(request.drop_address_raw, "dropAddressRaw")?;

        let ride_notes = normalize_optional(request.ride_notes);
        if ride_notes
            .as_deref()
            .is_some_and(|notes| notes.chars().count() > MAX_RIDE_NOTES_LENGTH)
        {
            return Err(AppError::validation(format!(
                "Ride notes must be at most {MAX_RIDE_NOTES_LENGTH} characters"
            )));
        }

        let pickup = GeoPoint::new(request.pickup_lat, request.pickup_lng);
        let drop = GeoPoint::new(request.drop_lat, request.drop_lng);
        let pickup_address = sanitize_address(&request.pickup_address);
        let drop_address = sanitize_address(&request.drop_address);
        self.rules
            .area
            .validate_booking(&pickup, &drop, &pickup_address, &drop_address)?;

        let quote = self.quote(distance_km, vehicle_type, priced_at)?;
        let validated_fare = self.rules.fares.clamp_client_fare(client_fare, &quote);
        if (validated_fare as f64) < client_fare.round() {
            warn!(
                "client fare {client_fare} above ceiling for quote {}; clamped to {validated_fare}",
                quote.total_fare
            );
        }

        let promo_code = normalize_optional(request.promo_code);
        let (fare, discount) = match &promo_code {
            Some(code) => {
                let promo = self.rules.promos.validate_promo_code(code);
                if !promo.valid {
                    return Err(AppError::Validation(promo.message));
                }
                let discounted = apply_discount(validated_fare, &promo);
                (discounted.final_fare, discounted.discount)
            }
            None => (validated_fare, 0),
        };

        let now = Utc::now();
        let trip = Trip {
            id: Uuid::new_v4().to_string(),
            rider_id: actor.id.clone(),
            driver_id: None,
            pickup_lat: pickup.lat,
            pickup_lng: pickup.lng,
            drop_lat: drop.lat,
            drop_lng: drop.lng,
            pickup_address,
            drop_address,
            pickup_address_raw,
            drop_address_raw,
            vehicle_type,
            distance_km,
            duration_min,
            fare,
            discount,
            promo_code: promo_code.as_deref().map(normalize_code),
            ride_notes,
            scheduled_at: request.scheduled_at,
            status: TripStatus::Searching,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"INSERT INTO trips (
                id, rider_id, driver_id, pickup_lat, pickup_lng, drop_lat, drop_lng,
                pickup_address, drop_address, pickup_address_raw, drop_address_raw,
                vehicle_type, distance_km, duration_min, fare, discount, promo_code,
                ride_notes, scheduled_at, status, created_at, updated_at
            ) VALUES (?, ?, NULL, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&trip.id)
        .bind(&trip.rider_id)
        .bind(trip.pickup_lat)
        .bind(trip.pickup_lng)
        .bind(trip.drop_lat)
        .bind(trip.drop_lng)
        .bind(&trip.pickup_address)
        .bind(&trip.drop_address)
        .bind(trip.pickup_address_raw.as_ref().map(Value::to_string))
        .bind(trip.drop_address_raw.as_ref().map(Value::to_string))
        .bind(trip.vehicle_type.as_str())
        .bind(trip.distance_km)
        .bind(trip.duration_min)
        .bind(trip.fare)
        .bind(trip.discount)
        .bind(&trip.promo_code)
        .bind(&trip.ride_notes)
        .bind(trip.scheduled_at)
        .bind(trip.status.as_str())
        .bind(trip.created_at)
        .bind(trip.updated_at)
        .execute(&self.db)
        .await?;

        info!(
            "trip {} created by rider {} ({}, fare {}, discount {})",
            trip.id, trip.rider_id, trip.vehicle_type, trip.fare, trip.discount
        );

        Ok(trip)
    }

    async fn find_trip(&self, trip_id: &str) -> Result<Option<Trip>, AppError> {
        sqlx::query_as::<_, TripRow>("SELECT * FROM trips WHERE id = ?")
            .bind(trip_id)
            .fetch_optional(&self.db)
            .await?
            .map(Trip::try_from)
            .transpose()
    }

    /// Loads a trip only if the actor is its rider or its assigned driver,
    /// depending on the actor's role. Anything else looks like a missing trip.
    async fn find_owned_trip(&self, trip_id: &str, actor: &Actor) -> Result<Trip, AppError> {
        let query = match actor.role {
            Role::Rider => "SELECT * FROM trips WHERE id = ? AND rider_id = ?",
            Role::Driver => "SELECT * FROM trips WHERE id = ? AND driver_id = ?",
        };
        let row = sqlx::query_as::<_, TripRow>(query)
            .bind(trip_id)
            .bind(&actor.id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found(TRIP_NOT_FOUND))?;
        Trip::try_from(row)
    }

    async fn find_rating(&self, trip_id: &str) -> Result<Option<Rating>, AppError> {
        let rating = sqlx::query_as::<_, Rating>("SELECT * FROM ratings WHERE trip_id = ?")
            .bind(trip_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(rating)
    }

    pub async fn get_trip(&self, trip_id: &str, actor: &Actor) -> Result<TripDetails, AppError> {
        let trip = self.find_owned_trip(trip_id, actor).await?;
        self.with_details(trip).await
    }

    /// Attaches the rating and the assigned driver's summary.
    async fn with_details(&self, trip: Trip) -> Result<TripDetails, AppError> {
        let rating = self.find_rating(&trip.id).await?;
        let driver = match &trip.driver_id {
            Some(driver_id) => self
                .driver_profile(driver_id)
                .await?
                .as_ref()
                .map(DriverSummary::from),
            None => None,
        };
        Ok(TripDetails {
            trip,
            rating,
            driver,
        })
    }

    async fn list_trips(&self, query: &str, bind: Option<&str>, limit: i64) -> Result<Vec<Trip>, AppError> {
        let mut query = sqlx::query_as::<_, TripRow>(query);
        if let Some(value) = bind {
            query = query.bind(value.to_string());
        }
        query
            .bind(limit)
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(Trip::try_from)
            .collect()
    }

    pub async fn list_rider_trips(&self, actor: &Actor) -> Result<Vec<Trip>, AppError> {
        self.list_trips(
            "SELECT * FROM trips WHERE rider_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
            Some(&actor.id),
            RIDER_TRIPS_LIMIT,
        )
        .await
    }

    pub async fn list_driver_trips(&self, actor: &Actor) -> Result<Vec<Trip>, AppError> {
        require_driver(actor)?;
        self.list_trips(
            "SELECT * FROM trips WHERE driver_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
            Some(&actor.id),
            DRIVER_TRIPS_LIMIT,
        )
        .await
    }

    /// Open trips for an online driver; offline drivers see nothing.
    pub async fn list_available_trips(&self, actor: &Actor) -> Result<Vec<Trip>, AppError> {
        require_driver(actor)?;
        let profile = self
            .driver_profile(&actor.id)
            .await?
            .ok_or_else(|| AppError::not_found(DRIVER_PROFILE_NOT_FOUND))?;
        if !profile.is_online {
            return Ok(Vec::new());
        }
        self.list_trips(
            "SELECT * FROM trips WHERE status = 'SEARCHING' AND driver_id IS NULL \
             ORDER BY created_at DESC, rowid DESC LIMIT ?",
            None,
            AVAILABLE_TRIPS_LIMIT,
        )
        .await
    }

    /// Claims an unassigned SEARCHING trip for the acting driver.
    ///
    /// The claim is one conditional UPDATE, so of several drivers racing for
    /// the same trip exactly one sees a changed row; the others get the same
    /// not-available error as for a trip that never existed.
    pub async fn accept_trip(&self, trip_id: &str, actor: &Actor) -> Result<Trip, AppError> {
        require_driver(actor)?;
        if self.driver_profile(&actor.id).await?.is_none() {
            return Err(AppError::not_found(DRIVER_PROFILE_NOT_FOUND));
        }

        let claimed = sqlx::query(
            r#"UPDATE trips SET driver_id = ?, status = 'ACCEPTED', updated_at = ?
               WHERE id = ? AND status = 'SEARCHING' AND driver_id IS NULL"#,
        )
        .bind(&actor.id)
        .bind(Utc::now())
        .bind(trip_id)
        .execute(&self.db)
        .await?
        .rows_affected();

        if claimed == 0 {
            warn!("driver {} could not claim trip {trip_id}", actor.id);
            return Err(AppError::not_found(TRIP_NOT_AVAILABLE));
        }

        info!("trip {trip_id} accepted by driver {}", actor.id);
        self.find_owned_trip(trip_id, actor).await
    }

    /// Moves a trip to `requested` on behalf of its rider or driver and
    /// returns it in the same shape as [`TripService::get_trip`].
    pub async fn set_trip_status(
        &self,
        trip_id: &str,
        actor: &Actor,
        requested: &str,
    ) -> Result<TripDetails, AppError> {
        let to: TripStatus = requested.parse()?;
        let trip = self.find_owned_trip(trip_id, actor).await?;
        let from = trip.status;

        if let Err(err) = self.rules.transitions.check(from, actor.role, to) {
            warn!("{} {} rejected {from} -> {to} on trip {trip_id}: {err}", actor.role, actor.id);
            return Err(err);
        }

        let now = Utc::now();
        let updated = sqlx::query(
            "UPDATE trips SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(to.as_str())
        .bind(now)
        .bind(trip_id)
        .bind(from.as_str())
        .execute(&self.db)
        .await?
        .rows_affected();

        if updated == 0 {
            // someone else moved the trip between our read and write
            warn!("trip {trip_id} changed concurrently; {from} -> {to} dropped");
            return Err(AppError::InvalidTransition { from, to });
        }

        info!("trip {trip_id} moved {from} -> {to} by {} {}", actor.role, actor.id);
        self.with_details(Trip {
            status: to,
            updated_at: now,
            ..trip
        })
        .await
    }

    /// Records the rider's one rating of a completed trip and folds it into
    /// the driver's running average.
    pub async fn submit_rating(
        &self,
        trip_id: &str,
        actor: &Actor,
        stars: i64,
    ) -> Result<Rating, AppError> {
        let stars = validate_stars(stars)?;
        if actor.role != Role::Rider {
            return Err(AppError::forbidden("Only the rider can rate a trip"));
        }
        let trip = self.find_owned_trip(trip_id, actor).await?;
        if trip.status != TripStatus::Completed {
            return Err(AppError::NotCompleted);
        }
        if self.find_rating(&trip.id).await?.is_some() {
            return Err(AppError::AlreadyRated);
        }

        let rating = Rating {
            id: Uuid::new_v4().to_string(),
            trip_id: trip.id.clone(),
            stars,
            created_at: Utc::now(),
        };

        let mut tx = self.db.begin().await?;
        let inserted = sqlx::query(
            "INSERT INTO ratings (id, trip_id, stars, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&rating.id)
        .bind(&rating.trip_id)
        .bind(rating.stars)
        .bind(rating.created_at)
        .execute(&mut *tx)
        .await;
        match inserted {
            Err(err) if is_unique_violation(&err) => return Err(AppError::AlreadyRated),
            other => {
                other?;
            }
        }

        if let Some(driver_id) = &trip.driver_id {
            // Single statement: every SET expression sees the old row.
            sqlx::query(
                r#"UPDATE driver_profiles
                   SET rating_sum = rating_sum + ?,
                       rating_count = rating_count + 1,
                       rating = ROUND(CAST(rating_sum + ? AS REAL) / (rating_count + 1), 1)
                   WHERE user_id = ?"#,
            )
            .bind(stars)
            .bind(stars)
            .bind(driver_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!("trip {trip_id} rated {stars} stars by rider {}", actor.id);
        Ok(rating)
    }

    pub async fn driver_profile(&self, user_id: &str) -> Result<Option<DriverProfile>, AppError> {
        sqlx::query_as::<_, DriverProfileRow>("SELECT * FROM driver_profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .map(DriverProfile::try_from)
            .transpose()
    }

    pub async fn register_driver(
        &self,
        actor: &Actor,
        profile: NewDriverProfile,
    ) -> Result<DriverProfile, AppError> {
        require_driver(actor)?;
        let required = |value: String, field: &str| {
            normalize_optional(Some(value))
                .ok_or_else(|| AppError::validation(format!("{field} is required")))
        };
        let created = DriverProfile {
            user_id: actor.id.clone(),
            name: required(profile.name, "Name")?,
            phone: normalize_optional(profile.phone),
            vehicle_type: profile.vehicle_type,
            vehicle_number: required(profile.vehicle_number, "Vehicle number")?,
            license_number: required(profile.license_number, "License number")?,
            is_online: false,
            rating: 0.0,
            rating_count: 0,
            created_at: Utc::now(),
        };

        let inserted = sqlx::query(
            r#"INSERT INTO driver_profiles (
                user_id, name, phone, vehicle_type, vehicle_number, license_number,
                is_online, rating, rating_count, rating_sum, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, 0, 0, 0, 0, ?)"#,
        )
        .bind(&created.user_id)
        .bind(&created.name)
        .bind(&created.phone)
        .bind(created.vehicle_type.as_str())
        .bind(&created.vehicle_number)
        .bind(&created.license_number)
        .bind(created.created_at)
        .execute(&self.db)
        .await;
        match inserted {
            Err(err) if is_unique_violation(&err) => {
                Err(AppError::validation("Driver profile already exists"))
            }
            Err(err) => Err(err.into()),
            Ok(_) => {
                info!("driver profile registered for {}", created.user_id);
                Ok(created)
            }
        }
    }

    pub async fn set_driver_online(&self, actor: &Actor, online: bool) -> Result<bool, AppError> {
        require_driver(actor)?;
        let updated = sqlx::query("UPDATE driver_profiles SET is_online = ? WHERE user_id = ?")
            .bind(online)
            .bind(&actor.id)
            .execute(&self.db)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(AppError::not_found(DRIVER_PROFILE_NOT_FOUND));
        }
        info!("driver {} is now {}", actor.id, if online { "online" } else { "offline" });
        Ok(online)
    }

    /// Trip by id without an ownership filter, for internal callers.
    pub async fn trip_by_id(&self, trip_id: &str) -> Result<Trip, AppError> {
        self.find_trip(trip_id)
            .await?
            .ok_or_else(|| AppError::not_found(TRIP_NOT_FOUND))
    }
}
