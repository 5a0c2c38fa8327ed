use axum::{Json, Router, extract::State, routing::get};

use crate::models::{AppState, ConfigResponse};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/config", get(get_config))
}

pub async fn home() -> &'static str {
    "Appointment System API is Running!"
}

/// The server's notion of "today", so the dashboard can default its date
/// picker to the same day the sweep uses.
pub async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        current_date: state.appointments.today(),
        is_simulation: state.appointments.is_simulation(),
        theme: "light",
    })
}
