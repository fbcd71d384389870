//! Webhook handlers.
//!
//! Each handler is a small adapter that decodes the request, calls into the
//! `gracebot-core` pipeline and maps the outcome to an HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use gracebot_core::errors::Error;

mod messages;

pub use messages::handle_messages;

pub async fn healthz() -> &'static str {
    "ok"
}

/// Pipeline error as an HTTP response.
pub struct ApiError(pub Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::DuplicateActivity(_) => StatusCode::CONFLICT,
            Error::External(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.0.to_string()).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}
