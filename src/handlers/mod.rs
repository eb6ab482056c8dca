use axum::extract::{FromRequest, FromRequestParts};

use crate::error::AppError;

pub mod admin;
pub mod auth;
pub mod customer;
pub mod driver;
pub mod fares;

/// `Json` whose rejections (bad syntax, unknown enum values) surface as
/// `AppError::Validation`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);
