use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    auth::CurrentUser,
    error::AppError,
    extract::{AppJson, AppQuery},
    models::driver::NewDriverProfile,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", post(register_profile))
        .route("/online", patch(set_online))
        .route("/trips", get(list_trips))
        .route("/trips/:id/accept", post(accept_trip))
}

async fn register_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    AppJson(profile): AppJson<NewDriverProfile>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = current.require_actor()?;
    let profile = state.trips.register_driver(actor, profile).await?;
    Ok((StatusCode::CREATED, Json(json!({ "driverProfile": profile }))))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OnlineForm {
    #[serde(default)]
    is_online: bool,
}

async fn set_online(
    State(state): State<AppState>,
    current: CurrentUser,
    AppJson(form): AppJson<OnlineForm>,
) -> Result<Json<Value>, AppError> {
    let actor = current.require_actor()?;
    let is_online = state.trips.set_driver_online(actor, form.is_online).await?;
    Ok(Json(json!({ "isOnline": is_online })))
}

#[derive(Deserialize)]
struct TripsFilter {
    filter: Option<String>,
}

async fn list_trips(
    State(state): State<AppState>,
    current: CurrentUser,
    AppQuery(params): AppQuery<TripsFilter>,
) -> Result<Json<Value>, AppError> {
    let actor = current.require_actor()?;
    let trips = match params.filter.as_deref().unwrap_or("available") {
        "available" => state.trips.list_available_trips(actor).await?,
        "my" => state.trips.list_driver_trips(actor).await?,
        _ => return Err(AppError::validation("Invalid filter")),
    };
    Ok(Json(json!({ "trips": trips })))
}

async fn accept_trip(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let actor = current.require_actor()?;
    let trip = state.trips.accept_trip(&trip_id, actor).await?;
    Ok(Json(json!({ "trip": trip })))
}
