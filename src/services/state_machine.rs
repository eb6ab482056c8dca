use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entities::booking::{self, BookingStatus};
use crate::error::{AppError, AppResult};

/// Actions that move a booking through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingAction {
    /// Driver takes an unassigned pending request
    Accept,
    /// Assigned driver picks the customer up
    Start,
    /// Driver or customer closes the ride
    Complete,
    /// Customer withdraws before the ride starts
    Cancel,
    /// Driver passes on a pending request; the row is deleted
    Skip,
    /// Customer rates a completed ride
    Rate,
}

impl fmt::Display for BookingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingAction::Accept => write!(f, "accept"),
            BookingAction::Start => write!(f, "start"),
            BookingAction::Complete => write!(f, "complete"),
            BookingAction::Cancel => write!(f, "cancel"),
            BookingAction::Skip => write!(f, "skip"),
            BookingAction::Rate => write!(f, "rate"),
        }
    }
}

impl BookingAction {
    /// Statuses the action may be applied from.
    pub fn allowed_from(self) -> &'static [BookingStatus] {
        match self {
            BookingAction::Accept | BookingAction::Skip => &[BookingStatus::Pending],
            BookingAction::Start => &[BookingStatus::Confirmed],
            BookingAction::Complete => &[BookingStatus::Confirmed, BookingStatus::InProgress],
            BookingAction::Cancel => &[BookingStatus::Pending, BookingStatus::Confirmed],
            BookingAction::Rate => &[BookingStatus::Completed],
        }
    }

    /// Status the booking ends up in. `Skip` removes the row and `Rate`
    /// leaves the status untouched, so both report the status they start from.
    pub fn target(self) -> BookingStatus {
        match self {
            BookingAction::Accept => BookingStatus::Confirmed,
            BookingAction::Start => BookingStatus::InProgress,
            BookingAction::Complete => BookingStatus::Completed,
            BookingAction::Cancel => BookingStatus::Cancelled,
            BookingAction::Skip => BookingStatus::Pending,
            BookingAction::Rate => BookingStatus::Completed,
        }
    }

    /// Human readable guard, used in `InvalidTransition` errors.
    pub fn precondition(self) -> String {
        let statuses = self
            .allowed_from()
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        match self {
            BookingAction::Accept | BookingAction::Skip => {
                format!("status in [{statuses}] and no driver assigned")
            }
            BookingAction::Start => format!("status in [{statuses}] and assigned to this driver"),
            BookingAction::Rate => format!("status in [{statuses}] and not yet rated"),
            BookingAction::Complete | BookingAction::Cancel => format!("status in [{statuses}]"),
        }
    }

    pub fn is_allowed_from(self, status: BookingStatus) -> bool {
        self.allowed_from().contains(&status)
    }
}

/// Check that `action` may be applied to `booking` as it currently stands.
///
/// Only the status-level guard is checked here; ownership and the atomic
/// conditional update are the lifecycle manager's job.
pub fn ensure_transition(booking: &booking::Model, action: BookingAction) -> AppResult<BookingStatus> {
    let status_ok = action.is_allowed_from(booking.status);
    let extra_ok = match action {
        BookingAction::Accept | BookingAction::Skip => booking.driver_id.is_none(),
        BookingAction::Rate => booking.rating.is_none(),
        _ => true,
    };

    if status_ok && extra_ok {
        Ok(action.target())
    } else {
        Err(invalid_transition(booking, action))
    }
}

pub fn invalid_transition(booking: &booking::Model, action: BookingAction) -> AppError {
    AppError::InvalidTransition {
        booking_id: booking.id,
        current: booking.status,
        action,
        required: action.precondition(),
    }
}
