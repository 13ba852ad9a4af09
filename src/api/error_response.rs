//! HTTP error response handling for the API
//!
//! Errors become a bare status code. The batch protocol has no error body, so
//! clients only ever see the status.

use crate::error::{Error, ToHttpStatus};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "batch failed internally");
        } else {
            tracing::debug!(error = %self, code = self.error_code(), "batch rejected");
        }

        status_code.into_response()
    }
}
