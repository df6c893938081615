use std::{fmt, fs::File};

use anyhow::Context;
use chrono::NaiveTime;
use cucumber::{given, then, when, World as _};
use tempfile::TempDir;
use vandi::{
    config::RideConfig,
    db::{init_pool, migrate},
    error::AppError,
    models::{
        driver::NewDriverProfile,
        rating::Rating,
        trip::{Trip, TripStatus, VehicleType},
        user::Actor,
    },
    services::trips::{CreateTrip, TripService},
};

#[derive(Debug, cucumber::World, Default)]
struct AppWorld {
    state: Option<TestState>,
    trip_id: Option<String>,
    last_trip: Option<Trip>,
    last_rating: Option<Rating>,
    last_error: Option<AppError>,
    race: Vec<Result<Trip, AppError>>,
}

impl AppWorld {
    fn trips(&self) -> &TripService {
        &self
            .state
            .as_ref()
            .expect("state must be initialised first")
            .trips
    }

    fn trip_id(&self) -> String {
        self.trip_id.clone().expect("a trip must be booked first")
    }

    fn trip_rider(&self) -> String {
        self.last_trip
            .as_ref()
            .map(|trip| trip.rider_id.clone())
            .expect("a booked trip")
    }

    fn record<T>(&mut self, result: Result<T, AppError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.last_error = None;
                Some(value)
            }
            Err(err) => {
                self.last_error = Some(err);
                None
            }
        }
    }

    fn take_error(&mut self) -> AppError {
        self.last_error
            .take()
            .expect("the previous step should have failed")
    }

    async fn book(&mut self, actor: Actor, request: CreateTrip, at: NaiveTime) {
        let result = self.trips().create_trip_at(&actor, request, &at).await;
        if let Some(trip) = self.record(result) {
            self.trip_id = Some(trip.id.clone());
            self.last_trip = Some(trip);
        }
    }

    async fn drive_to_completion(&mut self, driver: &str) {
        let trips = self.trips().clone();
        let trip_id = self.trip_id();
        let actor = Actor::driver(driver);
        trips.accept_trip(&trip_id, &actor).await.expect("accept");
        for status in ["ARRIVING", "STARTED", "COMPLETED"] {
            trips
                .set_trip_status(&trip_id, &actor, status)
                .await
                .expect("advance trip");
        }
    }
}

struct TestState {
    trips: TripService,
    _root: TempDir,
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState").finish()
    }
}

impl TestState {
    async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for bdd world")?;
        let db_path = root.path().join("bdd.sqlite");
        File::create(&db_path)?;
        let database_url = format!("sqlite://{}", db_path.to_string_lossy());

        let db = init_pool(&database_url).await?;
        migrate(&db).await?;

        let trips = TripService::new(db, RideConfig::default());
        Ok(Self { trips, _root: root })
    }
}

fn actor(role: &str, id: &str) -> Actor {
    match role {
        "driver" => Actor::driver(id),
        _ => Actor::rider(id),
    }
}

fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time of day")
}

/// Chennai Central to T. Nagar.
fn booking(vehicle: &str, distance_km: f64, fare: f64) -> CreateTrip {
    CreateTrip {
        pickup_lat: 13.0827,
        pickup_lng: 80.2707,
        drop_lat: 13.0418,
        drop_lng: 80.2341,
        pickup_address: "Chennai Central".into(),
        drop_address: "T. Nagar".into(),
        pickup_address_raw: None,
        drop_address_raw: None,
        distance_km,
        duration_min: 18.0,
        fare,
        vehicle_type: vehicle.into(),
        ride_notes: None,
        scheduled_at: None,
        promo_code: None,
    }
}

#[given("a fresh trip service")]
async fn given_fresh_service(world: &mut AppWorld) {
    *world = AppWorld {
        state: Some(TestState::new().await.expect("state")),
        ..AppWorld::default()
    };
}

async fn register_driver(world: &mut AppWorld, name: &str, online: bool) {
    let driver = Actor::driver(name);
    let profile = NewDriverProfile {
        name: name.to_string(),
        phone: Some("+91 98400 00000".into()),
        vehicle_type: VehicleType::Mini,
        vehicle_number: "TN 01 AB 1234".into(),
        license_number: "TN0120110012345".into(),
    };
    world
        .trips()
        .register_driver(&driver, profile)
        .await
        .expect("register driver");
    if online {
        world
            .trips()
            .set_driver_online(&driver, true)
            .await
            .expect("go online");
    }
}

#[given(regex = r#"^driver "([^"]+)" is registered and online$"#)]
async fn given_online_driver(world: &mut AppWorld, name: String) {
    register_driver(world, &name, true).await;
}

#[given(regex = r#"^driver "([^"]+)" is registered but offline$"#)]
async fn given_offline_driver(world: &mut AppWorld, name: String) {
    register_driver(world, &name, false).await;
}

#[given(regex = r#"^rider "([^"]+)" has booked a trip$"#)]
async fn given_booked_trip(world: &mut AppWorld, rider: String) {
    world
        .book(Actor::rider(rider), booking("MINI", 5.0, 100.0), at(14, 0))
        .await;
    assert!(world.last_error.is_none(), "booking failed: {:?}", world.last_error);
}

#[given(regex = r#"^driver "([^"]+)" has completed the trip$"#)]
async fn given_completed_trip(world: &mut AppWorld, driver: String) {
    world.drive_to_completion(&driver).await;
}

#[when(
    regex = r#"^(rider|driver) "([^"]+)" books a (MINI|SEDAN|SUV) trip of (-?[\d.]+) km offering fare (\d+) at (\d{2}):(\d{2})$"#
)]
async fn when_book(
    world: &mut AppWorld,
    role: String,
    id: String,
    vehicle: String,
    distance_km: f64,
    fare: f64,
    hour: u32,
    minute: u32,
) {
    let request = booking(&vehicle, distance_km, fare);
    world.book(actor(&role, &id), request, at(hour, minute)).await;
}

#[when(
    regex = r#"^rider "([^"]+)" books a (MINI|SEDAN|SUV) trip of ([\d.]+) km offering fare (\d+) at (\d{2}):(\d{2}) with promo "([^"]*)"$"#
)]
async fn when_book_with_promo(
    world: &mut AppWorld,
    rider: String,
    vehicle: String,
    distance_km: f64,
    fare: f64,
    hour: u32,
    minute: u32,
    promo: String,
) {
    let request = CreateTrip {
        promo_code: Some(promo),
        ..booking(&vehicle, distance_km, fare)
    };
    world.book(Actor::rider(rider), request, at(hour, minute)).await;
}

#[when(
    regex = r#"^rider "([^"]+)" books a trip from (-?[\d.]+), (-?[\d.]+) to (-?[\d.]+), (-?[\d.]+)$"#
)]
async fn when_book_between(
    world: &mut AppWorld,
    rider: String,
    pickup_lat: f64,
    pickup_lng: f64,
    drop_lat: f64,
    drop_lng: f64,
) {
    let request = CreateTrip {
        pickup_lat,
        pickup_lng,
        drop_lat,
        drop_lng,
        ..booking("MINI", 5.0, 100.0)
    };
    world.book(Actor::rider(rider), request, at(14, 0)).await;
}

#[when(regex = r#"^(rider|driver) "([^"]+)" accepts the trip$"#)]
async fn when_accept(world: &mut AppWorld, role: String, id: String) {
    let trip_id = world.trip_id();
    let result = world.trips().accept_trip(&trip_id, &actor(&role, &id)).await;
    if let Some(trip) = world.record(result) {
        world.last_trip = Some(trip);
    }
}

#[when(regex = r#"^drivers "([^"]+)" and "([^"]+)" accept the trip at the same time$"#)]
async fn when_accept_concurrently(world: &mut AppWorld, first: String, second: String) {
    let trip_id = world.trip_id();
    let claims = [first, second].map(|driver| {
        let trips = world.trips().clone();
        let trip_id = trip_id.clone();
        tokio::spawn(async move { trips.accept_trip(&trip_id, &Actor::driver(driver)).await })
    });
    world.race.clear();
    for claim in claims {
        world.race.push(claim.await.expect("claim task"));
    }
}

#[when(regex = r#"^(rider|driver) "([^"]+)" moves the trip to "([^"]+)"$"#)]
async fn when_move(world: &mut AppWorld, role: String, id: String, status: String) {
    let trip_id = world.trip_id();
    let result = world
        .trips()
        .set_trip_status(&trip_id, &actor(&role, &id), &status)
        .await;
    if let Some(details) = world.record(result) {
        world.last_trip = Some(details.trip);
    }
}

#[when(regex = r#"^rider "([^"]+)" rates the trip (-?\d+) stars$"#)]
async fn when_rate(world: &mut AppWorld, rider: String, stars: i64) {
    let trip_id = world.trip_id();
    let result = world
        .trips()
        .submit_rating(&trip_id, &Actor::rider(rider), stars)
        .await;
    if let Some(rating) = world.record(result) {
        world.last_rating = Some(rating);
    }
}

#[when(regex = r#"^rider "([^"]+)" books and rides another trip with driver "([^"]+)"$"#)]
async fn when_book_and_ride(world: &mut AppWorld, rider: String, driver: String) {
    world
        .book(Actor::rider(rider), booking("MINI", 5.0, 100.0), at(14, 0))
        .await;
    assert!(world.last_error.is_none(), "booking failed: {:?}", world.last_error);
    world.drive_to_completion(&driver).await;
}

#[then(regex = r#"^the booking succeeds in status "([^"]+)" with fare (\d+)$"#)]
async fn then_booking_succeeds(world: &mut AppWorld, status: String, fare: i64) {
    assert!(world.last_error.is_none(), "booking failed: {:?}", world.last_error);
    let trip = world.last_trip.as_ref().expect("a booked trip");
    assert_eq!(trip.status.as_str(), status);
    assert_eq!(trip.fare, fare);

    let stored = world.trips().trip_by_id(&trip.id).await.expect("stored trip");
    assert_eq!(stored.fare, fare);
    assert_eq!(stored.status, trip.status);
}

#[then("the trip has no driver")]
async fn then_no_driver(world: &mut AppWorld) {
    let stored = world.trips().trip_by_id(&world.trip_id()).await.expect("stored trip");
    assert_eq!(stored.driver_id, None);
}

#[then(regex = r#"^the trip discount is (\d+) with promo "([^"]+)"$"#)]
async fn then_discount(world: &mut AppWorld, discount: i64, promo: String) {
    let stored = world.trips().trip_by_id(&world.trip_id()).await.expect("stored trip");
    assert_eq!(stored.discount, discount);
    assert_eq!(stored.promo_code.as_deref(), Some(promo.as_str()));
}

#[then(regex = r#"^the request fails with a validation error mentioning "([^"]+)"$"#)]
async fn then_validation_error(world: &mut AppWorld, fragment: String) {
    match world.take_error() {
        AppError::Validation(message) => assert!(
            message.contains(&fragment),
            "expected {fragment:?} in {message:?}"
        ),
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[then(regex = r#"^the request is forbidden with "([^"]+)"$"#)]
async fn then_forbidden(world: &mut AppWorld, expected: String) {
    match world.take_error() {
        AppError::Forbidden(message) => assert_eq!(message, expected),
        other => panic!("expected forbidden, got {other:?}"),
    }
}

#[then(regex = r#"^the request fails as not found with "([^"]+)"$"#)]
async fn then_not_found(world: &mut AppWorld, expected: String) {
    match world.take_error() {
        AppError::NotFound(message) => assert_eq!(message, expected),
        other => panic!("expected not found, got {other:?}"),
    }
}

#[then("the request fails with a state error")]
async fn then_state_error(world: &mut AppWorld) {
    let err = world.take_error();
    assert!(
        matches!(err, AppError::InvalidTransition { .. }),
        "expected an invalid transition, got {err:?}"
    );
}

#[then("the request fails because the trip was already rated")]
async fn then_already_rated(world: &mut AppWorld) {
    let err = world.take_error();
    assert!(matches!(err, AppError::AlreadyRated), "got {err:?}");
}

#[then("the request fails because the trip is not completed")]
async fn then_not_completed(world: &mut AppWorld) {
    let err = world.take_error();
    assert!(matches!(err, AppError::NotCompleted), "got {err:?}");
}

#[then(regex = r#"^the trip is "([^"]+)" and assigned to "([^"]+)"$"#)]
async fn then_trip_assigned(world: &mut AppWorld, status: String, driver: String) {
    let stored = world.trips().trip_by_id(&world.trip_id()).await.expect("stored trip");
    assert_eq!(stored.status, status.parse::<TripStatus>().expect("status"));
    assert_eq!(stored.driver_id.as_deref(), Some(driver.as_str()));
}

#[then(regex = r#"^the trip is "([^"]+)" with no driver$"#)]
async fn then_trip_unassigned(world: &mut AppWorld, status: String) {
    let stored = world.trips().trip_by_id(&world.trip_id()).await.expect("stored trip");
    assert_eq!(stored.status, status.parse::<TripStatus>().expect("status"));
    assert_eq!(stored.driver_id, None);
}

#[then(regex = r#"^driver "([^"]+)" sees (\d+) available trips$"#)]
async fn then_available(world: &mut AppWorld, driver: String, expected: usize) {
    let trips = world
        .trips()
        .list_available_trips(&Actor::driver(driver))
        .await
        .expect("list available trips");
    assert_eq!(trips.len(), expected);
    assert!(trips.iter().all(|trip| trip.status == TripStatus::Searching));
}

#[then("exactly one of them wins the trip")]
async fn then_single_winner(world: &mut AppWorld) {
    let winners: Vec<&Trip> = world.race.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1, "race outcomes: {:?}", world.race);

    let loser = world
        .race
        .iter()
        .find_map(|r| r.as_ref().err())
        .expect("one claim must lose");
    assert!(
        matches!(loser, AppError::NotFound(message) if message == "Trip not available or already accepted"),
        "unexpected loser error: {loser:?}"
    );

    let stored = world.trips().trip_by_id(&world.trip_id()).await.expect("stored trip");
    assert_eq!(stored.status, TripStatus::Accepted);
    assert_eq!(stored.driver_id, winners[0].driver_id);
}

#[then(regex = r"^the rating is stored with (\d+) stars$")]
async fn then_rating_stored(world: &mut AppWorld, stars: i64) {
    assert!(world.last_error.is_none(), "rating failed: {:?}", world.last_error);
    let rating = world.last_rating.as_ref().expect("a rating");
    assert_eq!(rating.stars, stars);
    assert_eq!(rating.trip_id, world.trip_id());

    let details = world
        .trips()
        .get_trip(&world.trip_id(), &Actor::rider(world.trip_rider()))
        .await
        .expect("trip details");
    assert_eq!(details.rating.map(|r| r.stars), Some(stars));
}

#[then(regex = r#"^driver "([^"]+)" has a rating of ([\d.]+) over (\d+) trips$"#)]
async fn then_driver_rating(world: &mut AppWorld, driver: String, rating: f64, count: i64) {
    let profile = world
        .trips()
        .driver_profile(&driver)
        .await
        .expect("load profile")
        .expect("driver profile exists");
    assert!(
        (profile.rating - rating).abs() < 1e-9,
        "expected rating {rating}, got {}",
        profile.rating
    );
    assert_eq!(profile.rating_count, count);
}

#[tokio::main]
async fn main() {
    AppWorld::cucumber()
        .fail_on_skipped()
        .with_default_cli()
        .run("tests/features")
        .await;
}
