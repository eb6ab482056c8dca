use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::services::fare::FareBreakdown;
use crate::utils::validate::require_non_empty;
use crate::AppState;

use super::AppJson;

#[derive(Debug, Deserialize)]
pub struct FareQuoteRequest {
    pub pickup_location: String,
    pub dropoff_location: String,
    pub vehicle_type: String,
    pub service_type: String,
    pub duration_hours: Option<f64>,
    pub distance_km: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct FareQuoteResponse {
    pub distance_km: f64,
    #[serde(flatten)]
    pub breakdown: FareBreakdown,
}

/// Quote a trip without booking it
pub async fn estimate(
    State(state): State<AppState>,
    AppJson(payload): AppJson<FareQuoteRequest>,
) -> AppResult<Json<FareQuoteResponse>> {
    require_non_empty("pickup location", &payload.pickup_location)?;
    require_non_empty("dropoff location", &payload.dropoff_location)?;

    let (distance_km, breakdown) = state.bookings.quote_labels(
        payload.pickup_location.trim(),
        payload.dropoff_location.trim(),
        &payload.vehicle_type,
        &payload.service_type,
        payload.duration_hours,
        payload.distance_km,
    )?;

    Ok(Json(FareQuoteResponse {
        distance_km,
        breakdown,
    }))
}
