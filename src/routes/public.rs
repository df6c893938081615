use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Local, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::AppError,
    extract::{AppJson, AppQuery},
    models::trip::VehicleType,
    services::{pricing::FareQuote, promo::PromoResult},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/fares/quote", get(fare_quote))
        .route("/promos/validate", post(validate_promo))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteParams {
    distance_km: f64,
    vehicle_type: Option<String>,
    at: Option<DateTime<Utc>>,
}

async fn fare_quote(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<QuoteParams>,
) -> Result<Json<FareQuote>, AppError> {
    let vehicle = params
        .vehicle_type
        .as_deref()
        .map(VehicleType::parse_or_mini)
        .unwrap_or(VehicleType::Mini);
    let at = params
        .at
        .map(|ts| ts.with_timezone(&Local))
        .unwrap_or_else(Local::now);
    let quote = state.trips.quote(params.distance_km, vehicle, &at)?;
    Ok(Json(quote))
}

#[derive(Deserialize)]
struct PromoForm {
    code: String,
}

async fn validate_promo(
    State(state): State<AppState>,
    AppJson(form): AppJson<PromoForm>,
) -> Json<PromoResult> {
    Json(state.trips.validate_promo(&form.code))
}
