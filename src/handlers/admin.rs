use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::{booking, user};
use crate::error::AppResult;
use crate::services::dashboard::{DriverListing, OperatorOverview};
use crate::utils::jwt::Claims;
use crate::AppState;

use super::AppJson;

// ============ Overview ============

/// Booking counts, revenue and head counts across the whole service
pub async fn overview(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<OperatorOverview>> {
    let overview = state.dashboards.operator(&claims.actor()).await?;
    Ok(Json(overview))
}

// ============ User Management ============

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<user::Model>>> {
    let users = state.dashboards.users(&claims.actor()).await?;
    Ok(Json(users))
}

/// Activate or deactivate an account. Deactivated users cannot log in.
pub async fn set_user_active(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
    AppJson(payload): AppJson<SetActiveRequest>,
) -> AppResult<StatusCode> {
    state
        .auth
        .set_active(&claims.actor(), user_id, payload.is_active)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Drivers joined with their account details
pub async fn list_drivers(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<DriverListing>>> {
    let drivers = state.dashboards.drivers(&claims.actor()).await?;
    Ok(Json(drivers))
}

// ============ Booking Management ============

pub async fn list_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<booking::Model>>> {
    let bookings = state.bookings.all_bookings(&claims.actor()).await?;
    Ok(Json(bookings))
}

/// Remove a booking that no driver has taken yet
pub async fn delete_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state
        .bookings
        .admin_delete(&claims.actor(), booking_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
