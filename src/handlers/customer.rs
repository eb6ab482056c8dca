use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking;
use crate::error::AppResult;
use crate::services::dashboard::CustomerDashboard;
use crate::services::lifecycle::NewBooking;
use crate::services::rating::RatingSummary;
use crate::utils::jwt::Claims;
use crate::AppState;

use super::AppJson;

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub actual_fare: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rating: i32,
    pub feedback: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RateResponse {
    pub booking: booking::Model,
    pub driver_rating: RatingSummary,
}

/// Create a booking request
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<NewBooking>,
) -> AppResult<(StatusCode, Json<booking::Model>)> {
    let booking = state.bookings.create(&claims.actor(), payload).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// List the customer's bookings, newest first
pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<booking::Model>>> {
    let bookings = state.bookings.customer_bookings(&claims.actor()).await?;
    Ok(Json(bookings))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<booking::Model>> {
    let booking = state.bookings.get(&claims.actor(), booking_id).await?;
    Ok(Json(booking))
}

/// Cancel a pending or confirmed booking
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<booking::Model>> {
    let booking = state.bookings.cancel(&claims.actor(), booking_id).await?;
    Ok(Json(booking))
}

/// Mark a ride finished from the customer's side
pub async fn complete_booking(
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

/// Rate a completed ride
pub async fn rate_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
    AppJson(payload): AppJson<RateRequest>,
) -> AppResult<Json<RateResponse>> {
    let (booking, driver_rating) = state
        .bookings
        .rate(&claims.actor(), booking_id, payload.rating, payload.feedback)
        .await?;
    Ok(Json(RateResponse {
        booking,
        driver_rating,
    }))
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<CustomerDashboard>> {
    let dashboard = state.dashboards.customer(&claims.actor()).await?;
    Ok(Json(dashboard))
}
