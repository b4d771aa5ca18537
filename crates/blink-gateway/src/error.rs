use crate::model::ErrorResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use blink_core::{LinkError, MetricsError};
use tracing::error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    /// The request could not be parsed or failed validation.
    BadRequest(String),
    Link(LinkError),
    Metrics(MetricsError),
}

impl From<LinkError> for AppError {
    fn from(e: LinkError) -> Self {
        AppError::Link(e)
    }
}

impl From<MetricsError> for AppError {
    fn from(e: MetricsError) -> Self {
        AppError::Metrics(e)
    }
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::Link(e) if e.is_invalid_input() => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::Link(e) if e.is_not_found() => (StatusCode::NOT_FOUND, e.to_string()),
            AppError::Link(_) | AppError::Metrics(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        if status.is_server_error() {
            match &self {
                AppError::Link(e) => error!(error = %e, "link operation failed"),
                AppError::Metrics(e) => error!(error = %e, "metrics operation failed"),
                AppError::BadRequest(_) => {}
            }
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
