use crate::models::AppState;
use axum::Router;

pub mod appointment_routes;
pub mod doctor_routes;
pub mod home_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(appointment_routes::router())
        .merge(doctor_routes::router())
        .merge(home_routes::router())
        .with_state(state)
}
