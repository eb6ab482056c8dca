use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::handlers::{admin, auth, customer, driver, fares};
use crate::middleware::auth::{auth_middleware, require_admin, require_customer, require_driver};
use crate::middleware::rate_limit::create_public_governor;
use crate::middleware::role_rate_limit::{create_role_governor, RateLimitedRole};
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    let driver_governor = create_role_governor(RateLimitedRole::Driver);
    let customer_governor = create_role_governor(RateLimitedRole::Customer);
    // IP-based limit for everything reachable without a token
    let public_governor = create_public_governor();

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(public_governor.clone());

    let fare_routes = Router::new()
        .route("/estimate", post(fares::estimate))
        .layer(public_governor);

    // Admin routes only sit behind the global limiter
    let admin_routes = Router::new()
        .route("/overview", get(admin::overview))
        .route("/users", get(admin::list_users))
        .route("/users/{id}/active", put(admin::set_user_active))
        .route("/drivers", get(admin::list_drivers))
        .route("/bookings", get(admin::list_bookings))
        .route("/bookings/{id}", delete(admin::delete_booking))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let driver_routes = Router::new()
        .route("/requests", get(driver::open_requests))
        .route("/requests/{id}/accept", post(driver::accept_booking))
        .route("/requests/{id}/skip", post(driver::skip_booking))
        .route("/trips", get(driver::trip_history))
        .route("/trips/{id}/start", post(driver::start_trip))
        .route("/trips/{id}/complete", post(driver::complete_trip))
        .route("/dashboard", get(driver::dashboard))
        .route("/rating", get(driver::my_rating))
        .route("/profile", get(driver::profile))
        .route("/availability", put(driver::set_availability))
        .layer(driver_governor)
        .layer(middleware::from_fn(require_driver))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let customer_routes = Router::new()
        .route("/", post(customer::create_booking))
        .route("/", get(customer::my_bookings))
        .route("/dashboard", get(customer::dashboard))
        .route("/{id}", get(customer::get_booking))
        .route("/{id}/cancel", post(customer::cancel_booking))
        .route("/{id}/complete", post(customer::complete_booking))
        .route("/{id}/rate", post(customer::rate_booking))
        .layer(customer_governor)
        .layer(middleware::from_fn(require_customer))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/fares", fare_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/driver", driver_routes)
        .nest("/api/bookings", customer_routes)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        extract::ConnectInfo,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::services::distance::FixedDistance;
    use crate::services::notifier::TracingNotifier;
    use crate::store::MemoryStore;

    fn test_config() -> Config {
        Config {
            database_url: "memory://".to_string(),
            jwt_secret: "test-secret".to_string(),
            jwt_expiration_hours: 1,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            admin_username: "admin".to_string(),
            admin_email: "admin@example.com".to_string(),
            admin_password: "Admin123!".to_string(),
            notify_webhook_url: None,
            distance_min_km: 5.0,
            distance_max_km: 50.0,
        }
    }

    fn app() -> Router {
        let state = AppState::new(
            test_config(),
            Arc::new(MemoryStore::new()),
            Arc::new(TracingNotifier),
            Arc::new(FixedDistance(10.0)),
        );
        create_router(state)
    }

    fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(body) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        let mut request = builder.body(body).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        request
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn register_customer(app: &Router) -> String {
        let (status, body) = send(
            app,
            request(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({
                    "username": "john_doe",
                    "email": "john@example.com",
                    "password": "Secret123",
                    "phone": "1234567890",
                    "full_name": "John Doe",
                    "account_type": "customer",
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_fare_estimate_is_public() {
        let app = app();
        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/api/fares/estimate",
                None,
                Some(json!({
                    "pickup_location": "Terminal 2",
                    "dropoff_location": "Hotel Lotus",
                    "vehicle_type": "sedan",
                    "service_type": "airport_transfer",
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["distance_km"], 10.0);
        assert_eq!(body["total_fare"], 204.0);
    }

    #[tokio::test]
    async fn test_customer_books_and_lists() {
        let app = app();
        let token = register_customer(&app).await;
        let pickup = chrono::Utc::now() + chrono::Duration::days(1);

        let (status, created) = send(
            &app,
            request(
                Method::POST,
                "/api/bookings",
                Some(&token),
                Some(json!({
                    "pickup_location": "Terminal 2",
                    "dropoff_location": "Hotel Lotus",
                    "pickup_datetime": pickup,
                    "service_type": "airport_transfer",
                    "vehicle_type": "sedan",
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "pending");
        assert_eq!(created["estimated_fare"], 204.0);

        let (status, listed) = send(&app, request(Method::GET, "/api/bookings", Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_enum_is_a_validation_error() {
        let app = app();
        let token = register_customer(&app).await;

        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/api/bookings",
                Some(&token),
                Some(json!({
                    "pickup_location": "Terminal 2",
                    "dropoff_location": "Hotel Lotus",
                    "pickup_datetime": chrono::Utc::now() + chrono::Duration::days(1),
                    "service_type": "space_flight",
                    "vehicle_type": "sedan",
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_role_guards() {
        let app = app();
        let token = register_customer(&app).await;

        let (status, _) = send(&app, request(Method::GET, "/api/driver/requests", Some(&token), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, request(Method::GET, "/api/admin/overview", Some(&token), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, request(Method::GET, "/api/bookings", Some("garbage"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
