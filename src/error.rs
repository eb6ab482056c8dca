use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::entities::booking::BookingStatus;
use crate::services::state_machine::BookingAction;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input: empty locations, bad enum values, bad dates.
    #[error("{0}")]
    Validation(String),

    /// A lifecycle action was attempted outside its guard.
    #[error("cannot {action} booking {booking_id} while it is {current}: requires {required}")]
    InvalidTransition {
        booking_id: Uuid,
        current: BookingStatus,
        action: BookingAction,
        required: String,
    },

    /// Lost a race against a concurrent writer (e.g. another driver accepted first).
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    /// The store collaborator failed; the operation did not happen.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::Conflict(_) => "conflict",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Message safe to show to the caller.
    pub fn user_message(&self) -> String {
        match self {
            AppError::StoreUnavailable(_) => "Service temporarily unavailable".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        AppError::StoreUnavailable(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::StoreUnavailable(_) | AppError::Internal(_) => {
                tracing::error!("Internal service error: {}", self);
            }
            AppError::Conflict(_) | AppError::InvalidTransition { .. } => {
                tracing::warn!("Rejected booking action: {}", self);
            }
            _ => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let mut body = json!({
            "error": self.kind(),
            "message": self.user_message(),
        });

        if let AppError::InvalidTransition {
            booking_id,
            current,
            action,
            required,
        } = &self
        {
            body["booking_id"] = json!(booking_id);
            body["current_status"] = json!(current);
            body["action"] = json!(action.to_string());
            body["required"] = json!(required);
        }

        (self.status_code(), Json(body)).into_response()
    }
}
