pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

use std::sync::Arc;

use axum::{Router, http::header};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{
    clock::{Clock, OffsetClock, SimulatedClock},
    config::Config,
    models::AppState,
    services::appointment_service::AppointmentService,
    store::{AppointmentStore, JsonFileStore},
};

/// Builds the service for `cfg`: file store plus wall or simulated clock.
pub fn build_service(cfg: &Config) -> AppointmentService {
    let store: Arc<dyn AppointmentStore> = Arc::new(JsonFileStore::new(&cfg.data_file));
    let clock: Arc<dyn Clock> = match cfg.simulation_date {
        Some(date) => Arc::new(SimulatedClock::new(date)),
        None => Arc::new(OffsetClock::from_minutes(cfg.utc_offset_minutes).unwrap_or_default()),
    };
    AppointmentService::new(store, clock)
}

/// Full HTTP application with CORS and request tracing.
pub fn app(service: Arc<AppointmentService>) -> Router {
    let state = AppState {
        appointments: service,
    };

    // Browser dashboards are served from a different origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
