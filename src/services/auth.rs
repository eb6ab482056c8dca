use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::driver::{self, DEFAULT_RATING};
use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};
use crate::store::Store;
use crate::utils::validate::{
    is_valid_email, is_valid_phone, require_non_empty, PasswordCheck, Strength,
};

use super::Actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Customer,
    Driver,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriverDetails {
    pub license_number: String,
    pub license_expiry: NaiveDate,
    pub experience_years: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub full_name: String,
    pub account_type: AccountType,
    pub driver: Option<DriverDetails>,
}

/// Registers and authenticates users.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create a customer or driver account. Driver accounts get their
    /// driver profile in the same call.
    pub async fn create_account(
        &self,
        account: NewAccount,
    ) -> AppResult<(user::Model, Option<driver::Model>)> {
        require_non_empty("username", &account.username)?;
        require_non_empty("full name", &account.full_name)?;
        require_non_empty("email", &account.email)?;
        require_non_empty("phone", &account.phone)?;

        if !is_valid_email(account.email.trim()) {
            return Err(AppError::Validation(
                "Please enter a valid email address".to_string(),
            ));
        }
        if !is_valid_phone(&account.phone) {
            return Err(AppError::Validation(
                "Please enter a valid phone number".to_string(),
            ));
        }
        if PasswordCheck::of(&account.password).strength() == Strength::Weak {
            return Err(AppError::Validation(
                "Password must meet at least 3 of: 8+ characters, uppercase, lowercase, digit, special character"
                    .to_string(),
            ));
        }

        let details = match (account.account_type, account.driver) {
            (AccountType::Driver, Some(details)) => Some(validate_driver(details)?),
            (AccountType::Driver, None) => {
                return Err(AppError::Validation(
                    "Driver accounts need license details".to_string(),
                ));
            }
            (AccountType::Customer, _) => None,
        };

        let username = account.username.trim().to_string();
        if self.store.find_user_by_username(&username).await?.is_some() {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }

        let role = match account.account_type {
            AccountType::Customer => UserRole::Customer,
            AccountType::Driver => UserRole::Driver,
        };
        let user = new_user(
            username,
            account.email.trim().to_string(),
            &account.password,
            account.phone.trim().to_string(),
            account.full_name.trim().to_string(),
            role,
        )?;

        let (user, driver) = match details {
            Some(details) => {
                let profile = driver::Model {
                    id: Uuid::new_v4(),
                    user_id: user.id,
                    license_number: details.license_number.trim().to_string(),
                    license_expiry: details.license_expiry,
                    experience_years: details.experience_years,
                    rating: DEFAULT_RATING,
                    is_available: true,
                    created_at: user.created_at,
                };
                let (user, profile) = self.store.insert_driver_account(user, profile).await?;
                (user, Some(profile))
            }
            None => (self.store.insert_user(user).await?, None),
        };

        tracing::info!(
            user_id = %user.id,
            username = %user.username,
            role = ?user.role,
            "Account created"
        );
        Ok((user, driver))
    }

    /// Check credentials. Unknown users, wrong passwords and deactivated
    /// accounts all fail the same way.
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<user::Model> {
        let invalid = || AppError::Unauthorized("Invalid username or password".to_string());

        let user = self
            .store
            .find_user_by_username(username.trim())
            .await?
            .ok_or_else(invalid)?;

        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|e| AppError::Internal(format!("Failed to parse password hash: {}", e)))?;

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| invalid())?;

        if !user.is_active {
            tracing::info!(user_id = %user.id, "Login attempt on deactivated account");
            return Err(invalid());
        }

        Ok(user)
    }

    /// Create the admin account unless a user with that name already exists.
    pub async fn seed_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> AppResult<Option<user::Model>> {
        if self.store.find_user_by_username(username).await?.is_some() {
            return Ok(None);
        }

        let admin = new_user(
            username.to_string(),
            email.to_string(),
            password,
            "0000000000".to_string(),
            "Admin".to_string(),
            UserRole::Admin,
        )?;
        Ok(Some(self.store.insert_user(admin).await?))
    }

    pub async fn set_active(&self, actor: &Actor, user_id: Uuid, is_active: bool) -> AppResult<()> {
        actor.require(UserRole::Admin)?;
        if actor.user_id == user_id && !is_active {
            return Err(AppError::Validation(
                "You cannot deactivate your own account".to_string(),
            ));
        }
        if self.store.set_user_active(user_id, is_active).await? == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        tracing::info!(%user_id, is_active, "User activation changed");
        Ok(())
    }

}

/// A fresh, active user row with an argon2 password hash.
fn new_user(
    username: String,
    email: String,
    password: &str,
    phone: String,
    full_name: String,
    role: UserRole,
) -> AppResult<user::Model> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?
        .to_string();

    let now = Utc::now();
    Ok(user::Model {
        id: Uuid::new_v4(),
        username,
        email,
        password_hash,
        phone,
        role,
        full_name,
        is_active: true,
        created_at: now.into(),
        updated_at: now.into(),
    })
}

fn validate_driver(details: DriverDetails) -> AppResult<DriverDetails> {
    require_non_empty("license number", &details.license_number)?;
    if details.license_expiry <= Utc::now().date_naive() {
        return Err(AppError::Validation("Driver license has expired".to_string()));
    }
    if details.experience_years < 0 {
        return Err(AppError::Validation(
            "Years of experience cannot be negative".to_string(),
        ));
    }
    Ok(details)
}
