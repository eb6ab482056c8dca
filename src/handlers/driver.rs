use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::{booking, driver};
use crate::error::AppResult;
use crate::services::dashboard::{DriverDashboard, TripFilter};
use crate::services::rating::RatingSummary;
use crate::utils::jwt::Claims;
use crate::AppState;

use super::customer::CompleteRequest;
use super::{AppJson, AppQuery};

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub is_available: bool,
}

/// Open requests: pending bookings no driver has taken yet
pub async fn open_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<booking::Model>>> {
    let requests = state.bookings.open_requests(&claims.actor()).await?;
    Ok(Json(requests))
}

/// Accept an open request. Only one driver can win a request.
pub async fn accept_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<booking::Model>> {
    let booking = state.bookings.accept(&claims.actor(), booking_id).await?;
    Ok(Json(booking))
}

/// Skip an open request, removing it
pub async fn skip_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.bookings.skip(&claims.actor(), booking_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn start_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<booking::Model>> {
    let booking = state.bookings.start(&claims.actor(), booking_id).await?;
    Ok(Json(booking))
}

pub async fn complete_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
    payload: Option<Json<CompleteRequest>>,
) -> AppResult<Json<booking::Model>> {
    let actual_fare = payload.and_then(|Json(body)| body.actual_fare);
    let booking = state
        .bookings
        .complete(&claims.actor(), booking_id, actual_fare)
        .await?;
    Ok(Json(booking))
}

/// Trip history, optionally filtered by status and pickup date range
pub async fn trip_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppQuery(filter): AppQuery<TripFilter>,
) -> AppResult<Json<Vec<booking::Model>>> {
    let trips = state
        .dashboards
        .trip_history(&claims.actor(), &filter)
        .await?;
    Ok(Json(trips))
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<DriverDashboard>> {
    let dashboard = state
        .dashboards
        .driver(&claims.actor(), Utc::now())
        .await?;
    Ok(Json(dashboard))
}

pub async fn my_rating(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<RatingSummary>> {
    let summary = state.dashboards.driver_rating(&claims.actor()).await?;
    Ok(Json(summary))
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<driver::Model>> {
    let profile = state.bookings.driver_profile(&claims.actor()).await?;
    Ok(Json(profile))
}

/// Toggle whether the driver is taking new rides
pub async fn set_availability(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<AvailabilityRequest>,
) -> AppResult<Json<driver::Model>> {
    let profile = state
        .bookings
        .set_availability(&claims.actor(), payload.is_available)
        .await?;
    Ok(Json(profile))
}
