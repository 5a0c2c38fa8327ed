// src/routes/doctor_routes.rs

use axum::{Json, Router, extract::State, routing::get};

use crate::models::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/doctors", get(list_doctors))
}

pub async fn list_doctors(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.appointments.doctors().await)
}
