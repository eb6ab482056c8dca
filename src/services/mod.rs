pub mod auth;
pub mod dashboard;
pub mod distance;
pub mod fare;
pub mod lifecycle;
pub mod notifier;
pub mod rating;
pub mod state_machine;

use uuid::Uuid;

use crate::entities::user::UserRole;
use crate::error::{AppError, AppResult};

/// The authenticated caller of a core operation.
///
/// Built from the session token by the HTTP layer and passed explicitly
/// into every call; the core keeps no notion of a "current user".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl Actor {
    pub fn new(user_id: Uuid, role: UserRole) -> Self {
        Self { user_id, role }
    }

    pub fn require(&self, role: UserRole) -> AppResult<()> {
        if self.role != role {
            return Err(AppError::Forbidden(format!(
                "This action requires the {} role",
                role_name(role)
            )));
        }
        Ok(())
    }
}

fn role_name(role: UserRole) -> &'static str {
    match role {
        UserRole::Admin => "admin",
        UserRole::Driver => "driver",
        UserRole::Customer => "customer",
    }
}
