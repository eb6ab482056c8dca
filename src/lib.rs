pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;

use services::auth::AuthService;
use services::dashboard::DashboardService;
use services::distance::{DistanceProvider, RandomDistance};
use services::lifecycle::BookingManager;
use services::notifier::{Notifier, TracingNotifier, WebhookNotifier};
use store::Store;

pub use config::Config;
pub use error::{AppError, AppResult};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub auth: AuthService,
    pub bookings: BookingManager,
    pub dashboards: DashboardService,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        distance: Arc<dyn DistanceProvider>,
    ) -> Self {
        Self {
            auth: AuthService::new(store.clone()),
            bookings: BookingManager::new(store.clone(), notifier, distance),
            dashboards: DashboardService::new(store),
            config,
        }
    }

    /// State wired from configuration: webhook notifications when a URL is
    /// configured, random distances within the configured bounds. Fails
    /// when the distance bounds are unusable.
    pub fn from_config(config: Config, store: Arc<dyn Store>) -> AppResult<Self> {
        let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
            None => Arc::new(TracingNotifier),
        };
        let distance = Arc::new(RandomDistance::new(
            config.distance_min_km,
            config.distance_max_km,
        )?);
        Ok(Self::new(config, store, notifier, distance))
    }
}
