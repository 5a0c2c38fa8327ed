// src/routes/appointment_routes.rs

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};

use crate::{
    error::ApiError,
    models::{
        AppState, Appointment, AppointmentQuery, AppointmentStatus, CreateAppointmentRequest,
        UnknownStatus, UpdateStatusRequest,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route("/appointments/{appointment_id}/status", patch(update_status))
}

/* ============================================================
   GET /appointments?date=&status=&search=
   ============================================================ */

pub async fn list_appointments(
    State(state): State<AppState>,
    Query(q): Query<AppointmentQuery>,
) -> Json<Vec<Appointment>> {
    Json(state.appointments.list(&q).await)
}

/* ============================================================
   POST /appointments
   ============================================================ */

pub async fn create_appointment(
    State(state): State<AppState>,
    body: Result<Json<CreateAppointmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let Json(req) = body.map_err(ApiError::invalid_body)?;
    let created = state.appointments.create(req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/* ============================================================
   PATCH /appointments/{id}/status
   ============================================================ */

pub async fn update_status(
    State(state): State<AppState>,
    Path(appointment_id): Path<String>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<Appointment>, ApiError> {
    let Json(req) = body.map_err(ApiError::invalid_body)?;

    let Some(raw) = req.status.filter(|s| !s.trim().is_empty()) else {
        return Err(ApiError::BadRequest("VALIDATION_ERROR", "Missing status".into()));
    };
    let status: AppointmentStatus = raw
        .parse()
        .map_err(|e: UnknownStatus| ApiError::BadRequest("VALIDATION_ERROR", e.to_string()))?;

    state
        .appointments
        .update_status(&appointment_id, status)
        .await
        .map(Json)
        .ok_or_else(ApiError::appointment_not_found)
}
