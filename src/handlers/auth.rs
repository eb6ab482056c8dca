use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::driver;
use crate::entities::user::{self, UserRole};
use crate::error::AppResult;
use crate::services::auth::NewAccount;
use crate::utils::jwt::create_token;
use crate::AppState;

use super::AppJson;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<driver::Model>,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
}

impl From<&user::Model> for UserInfo {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
        }
    }
}

fn issue_token(state: &AppState, user: &user::Model) -> AppResult<String> {
    create_token(
        user.id,
        &user.username,
        user.role,
        &state.config.jwt_secret,
        state.config.jwt_expiration_hours,
    )
}

/// Register a customer or driver account
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<NewAccount>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let (user, driver) = state.auth.create_account(payload).await?;
    let token = issue_token(&state, &user)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserInfo::from(&user),
            driver,
        }),
    ))
}

/// Login with username and password
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = state
        .auth
        .authenticate(&payload.username, &payload.password)
        .await?;
    let token = issue_token(&state, &user)?;

    Ok(Json(AuthResponse {
        token,
        user: UserInfo::from(&user),
        driver: None,
    }))
}
