use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::services::appointment_service::BookingError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_time: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    /// Double booking; carries the suggested start time.
    Conflict(&'static str, String, String),
}

impl ApiError {
    pub fn appointment_not_found() -> Self {
        ApiError::NotFound("NOT_FOUND", "Appointment not found".into())
    }

    pub fn invalid_body(rejection: JsonRejection) -> Self {
        ApiError::BadRequest("INVALID_BODY", rejection.body_text())
    }

    fn to_error_response(code: &str, message: &str) -> ErrorResponse {
        ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
            },
            message: None,
            suggested_time: None,
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(e: BookingError) -> Self {
        match e {
            BookingError::MissingFields(_) => ApiError::BadRequest("MISSING_FIELDS", e.to_string()),
            BookingError::InvalidFormat(_) => ApiError::BadRequest("INVALID_FORMAT", e.to_string()),
            BookingError::UnknownStatus(_) => ApiError::BadRequest("VALIDATION_ERROR", e.to_string()),
            BookingError::DoctorBusy { suggested_time } => ApiError::Conflict(
                "DOCTOR_BUSY",
                "Doctor is busy at this time.".into(),
                suggested_time,
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(code, msg) => {
                (StatusCode::BAD_REQUEST, Json(ApiError::to_error_response(code, &msg))).into_response()
            }
            ApiError::NotFound(code, msg) => {
                (StatusCode::NOT_FOUND, Json(ApiError::to_error_response(code, &msg))).into_response()
            }
            ApiError::Conflict(code, msg, suggested_time) => {
                let mut body = ApiError::to_error_response(code, &msg);
                body.message = Some(msg);
                body.suggested_time = Some(suggested_time);
                (StatusCode::CONFLICT, Json(body)).into_response()
            }
        }
    }
}
