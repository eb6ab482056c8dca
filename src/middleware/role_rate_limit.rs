use axum::http::Request;
use std::sync::Arc;
use tower_governor::{
    governor::GovernorConfigBuilder,
    key_extractor::KeyExtractor,
    GovernorError, GovernorLayer,
};
use uuid::Uuid;

use crate::middleware::rate_limit::rate_limit_error_handler;
use crate::utils::jwt::Claims;

/// Keys the limiter on the user id from the JWT claims that
/// `auth_middleware` put in the request extensions.
#[derive(Debug, Clone, Copy)]
pub struct UserIdExtractor;

impl KeyExtractor for UserIdExtractor {
    type Key = Uuid;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let claims = req
            .extensions()
            .get::<Claims>()
            .ok_or(GovernorError::UnableToExtractKey)?;

        Ok(claims.sub)
    }
}

pub type RoleGovernorLayer = GovernorLayer<
    UserIdExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    axum::body::Body,
>;

/// Roles that get a per-user limit. Admin routes only sit behind the
/// global IP limiter, so admins have no variant here.
#[derive(Debug, Clone, Copy)]
pub enum RateLimitedRole {
    Customer,
    Driver,
}

impl RateLimitedRole {
    /// (milliseconds per token, burst)
    fn quota(self) -> (u64, u32) {
        match self {
            // Drivers poll open requests, so they get 5x the customer budget.
            RateLimitedRole::Driver => (120, 500),
            RateLimitedRole::Customer => (600, 100),
        }
    }
}

pub fn create_role_governor(role: RateLimitedRole) -> RoleGovernorLayer {
    let (per_ms, burst) = role.quota();

    let config = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(burst)
            .key_extractor(UserIdExtractor)
            .finish()
            .expect("rate limit period and burst must be non-zero"),
    );

    GovernorLayer::new(config).error_handler(rate_limit_error_handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::user::UserRole;

    #[test]
    fn test_extracts_user_id_from_claims() {
        let user_id = Uuid::new_v4();
        let mut request = Request::new(());
        request.extensions_mut().insert(Claims {
            sub: user_id,
            username: "driver_mike".to_string(),
            role: UserRole::Driver,
            exp: 0,
            iat: 0,
        });
        assert_eq!(UserIdExtractor.extract(&request).unwrap(), user_id);
    }

    #[test]
    fn test_missing_claims_cannot_be_keyed() {
        let request = Request::new(());
        assert!(matches!(
            UserIdExtractor.extract(&request),
            Err(GovernorError::UnableToExtractKey)
        ));
    }

    #[test]
    fn test_drivers_get_larger_budget() {
        assert!(RateLimitedRole::Driver.quota().1 > RateLimitedRole::Customer.quota().1);
    }
}
