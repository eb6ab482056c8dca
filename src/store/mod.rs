//! Persistence boundary for the booking core.
//!
//! Every booking mutation goes through [`Store::update_booking`] or
//! [`Store::delete_booking`] with a [`BookingGuard`]; the guard is evaluated
//! in the same atomic operation as the write, and the affected row count
//! tells the caller whether it won.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus};
use crate::entities::{driver, user};
use crate::error::AppResult;
use crate::services::state_machine::BookingAction;

pub use memory::MemoryStore;
pub use postgres::DbStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_user(&self, user: user::Model) -> AppResult<user::Model>;
    async fn find_user(&self, id: Uuid) -> AppResult<Option<user::Model>>;
    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<user::Model>>;
    async fn list_users(&self) -> AppResult<Vec<user::Model>>;
    async fn set_user_active(&self, id: Uuid, is_active: bool) -> AppResult<u64>;

    async fn insert_driver(&self, driver: driver::Model) -> AppResult<driver::Model>;
    /// Insert a driver-role user and its profile together; neither row is
    /// kept if either insert fails.
    async fn insert_driver_account(
        &self,
        user: user::Model,
        driver: driver::Model,
    ) -> AppResult<(user::Model, driver::Model)>;
    async fn find_driver(&self, id: Uuid) -> AppResult<Option<driver::Model>>;
    async fn find_driver_by_user(&self, user_id: Uuid) -> AppResult<Option<driver::Model>>;
    async fn list_drivers(&self) -> AppResult<Vec<driver::Model>>;
    async fn set_driver_rating(&self, id: Uuid, rating: f64) -> AppResult<u64>;
    async fn set_driver_availability(&self, id: Uuid, is_available: bool) -> AppResult<u64>;

    async fn insert_booking(&self, booking: booking::Model) -> AppResult<booking::Model>;
    async fn find_booking(&self, id: Uuid) -> AppResult<Option<booking::Model>>;
    /// Matching bookings, newest first by `created_at`.
    async fn list_bookings(&self, filter: &BookingFilter) -> AppResult<Vec<booking::Model>>;
    /// Apply `changes` only if the row still satisfies `guard`. Returns rows affected.
    async fn update_booking(
        &self,
        id: Uuid,
        changes: &BookingChanges,
        guard: &BookingGuard,
    ) -> AppResult<u64>;
    /// Delete the row only if it still satisfies `guard`. Returns rows affected.
    async fn delete_booking(&self, id: Uuid, guard: &BookingGuard) -> AppResult<u64>;
}

/// Condition on `bookings.driver_id` checked alongside the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverGuard {
    Any,
    Unassigned,
    AssignedTo(Uuid),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingGuard {
    pub statuses: Vec<BookingStatus>,
    pub driver: DriverGuard,
    pub unrated: bool,
}

impl BookingGuard {
    /// The store-level guard matching an action's precondition.
    pub fn for_action(action: BookingAction) -> Self {
        let driver = match action {
            BookingAction::Accept | BookingAction::Skip => DriverGuard::Unassigned,
            _ => DriverGuard::Any,
        };

        Self {
            statuses: action.allowed_from().to_vec(),
            driver,
            unrated: action == BookingAction::Rate,
        }
    }

    pub fn assigned_to(mut self, driver_id: Uuid) -> Self {
        self.driver = DriverGuard::AssignedTo(driver_id);
        self
    }

    pub fn matches(&self, booking: &booking::Model) -> bool {
        let driver_ok = match self.driver {
            DriverGuard::Any => true,
            DriverGuard::Unassigned => booking.driver_id.is_none(),
            DriverGuard::AssignedTo(id) => booking.driver_id == Some(id),
        };

        self.statuses.contains(&booking.status)
            && driver_ok
            && (!self.unrated || booking.rating.is_none())
    }
}

/// Columns a lifecycle transition writes. `None` leaves a column alone;
/// `driver_id: Some(None)` clears the assignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingChanges {
    pub status: Option<BookingStatus>,
    pub driver_id: Option<Option<Uuid>>,
    pub actual_fare: Option<f64>,
    pub rating: Option<i32>,
    pub feedback: Option<String>,
}

impl BookingChanges {
    /// Move to `status`, detaching the driver when the new status does not
    /// carry one.
    pub fn status(status: BookingStatus) -> Self {
        Self {
            status: Some(status),
            driver_id: (!status.requires_driver()).then_some(None),
            ..Default::default()
        }
    }

    /// Move to `status` with `driver_id` attached.
    pub fn assign(status: BookingStatus, driver_id: Uuid) -> Self {
        Self {
            status: Some(status),
            driver_id: Some(Some(driver_id)),
            ..Default::default()
        }
    }

    pub fn apply(&self, booking: &mut booking::Model, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            booking.status = status;
        }
        if let Some(driver_id) = self.driver_id {
            booking.driver_id = driver_id;
        }
        if let Some(fare) = self.actual_fare {
            booking.actual_fare = Some(fare);
        }
        if let Some(rating) = self.rating {
            booking.rating = Some(rating);
        }
        if let Some(feedback) = &self.feedback {
            booking.feedback = Some(feedback.clone());
        }
        booking.updated_at = now.into();
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingFilter {
    pub customer_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
    pub unassigned: bool,
}

impl BookingFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn customer(customer_id: Uuid) -> Self {
        Self {
            customer_id: Some(customer_id),
            ..Default::default()
        }
    }

    pub fn driver(driver_id: Uuid) -> Self {
        Self {
            driver_id: Some(driver_id),
            ..Default::default()
        }
    }

    /// The driver accept queue: pending requests nobody has taken.
    pub fn open_requests() -> Self {
        Self {
            status: Some(BookingStatus::Pending),
            unassigned: true,
            ..Default::default()
        }
    }

    pub fn matches(&self, booking: &booking::Model) -> bool {
        self.customer_id.is_none_or(|id| booking.customer_id == id)
            && self.driver_id.is_none_or(|id| booking.driver_id == Some(id))
            && self.status.is_none_or(|s| booking.status == s)
            && (!self.unassigned || booking.driver_id.is_none())
    }
}
