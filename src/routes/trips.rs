use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    auth::CurrentUser,
    error::AppError,
    extract::AppJson,
    services::trips::CreateTrip,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_trips).post(create_trip))
        .route("/:id", get(trip_detail).patch(update_status))
        .route("/:id/rating", post(submit_rating))
}

async fn create_trip(
    State(state): State<AppState>,
    current: CurrentUser,
    AppJson(request): AppJson<CreateTrip>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = current.require_actor()?;
    let trip = state.trips.create_trip(actor, request).await?;
    Ok((StatusCode::CREATED, Json(json!({ "trip": trip }))))
}

async fn list_trips(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Value>, AppError> {
    let actor = current.require_actor()?;
    let trips = state.trips.list_rider_trips(actor).await?;
    Ok(Json(json!({ "trips": trips })))
}

async fn trip_detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let actor = current.require_actor()?;
    let trip = state.trips.get_trip(&trip_id, actor).await?;
    Ok(Json(json!({ "trip": trip })))
}

#[derive(Deserialize)]
struct StatusForm {
    status: String,
}

async fn update_status(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
    AppJson(form): AppJson<StatusForm>,
) -> Result<Json<Value>, AppError> {
    let actor = current.require_actor()?;
    let trip = state
        .trips
        .set_trip_status(&trip_id, actor, &form.status)
        .await?;
    Ok(Json(json!({ "trip": trip })))
}

#[derive(Deserialize)]
struct RatingForm {
    stars: i64,
}

async fn submit_rating(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
    AppJson(form): AppJson<RatingForm>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = current.require_actor()?;
    let rating = state.trips.submit_rating(&trip_id, actor, form.stars).await?;
    Ok((StatusCode::CREATED, Json(json!({ "rating": rating }))))
}
