use std::net::SocketAddr;

use axum::middleware;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chauffeur_booking::{
    config::Config,
    db,
    middleware::rate_limit::{create_global_governor, log_request},
    routes, AppState,
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chauffeur_booking=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!("Starting server at {}", config.server_addr());

    let store = db::open_store(&config)
        .await
        .expect("Failed to open store");

    let state = AppState::from_config(config.clone(), store)
        .expect("Invalid distance bounds");

    match state
        .auth
        .seed_admin(
            &config.admin_username,
            &config.admin_email,
            &config.admin_password,
        )
        .await
    {
        Ok(Some(admin)) => tracing::info!("Admin account created: {}", admin.username),
        Ok(None) => tracing::debug!("Admin account already present"),
        Err(e) => panic!("Failed to seed admin account: {}", e),
    }

    // Outermost first: log, trace, CORS, then the global per-IP limit
    let app = routes::create_router(state).layer(
        ServiceBuilder::new()
            .layer(middleware::from_fn(log_request))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
            .layer(create_global_governor()),
    );

    // Peer addresses are needed for IP rate limiting and request logs
    let addr: SocketAddr = config.server_addr().parse().expect("Invalid address");
    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
