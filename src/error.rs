// Error types: ApiError for everything crossing the REST boundary,
// AppError for responses produced by the web layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    // (a) transport failure: DNS, refused connection, timeout
    #[error("Network error: {0}")]
    Network(String),
    // (b) non-2xx with a structured body
    #[error("{detail}")]
    Validation { status: u16, detail: String },
    // (c) non-2xx with nothing useful in the body
    #[error("Request failed with status {status}")]
    Status { status: u16 },
    // (d) expired or missing access token on a protected request
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Session expired. Please log in again.")]
    SessionExpired,
    // Login / refresh rejected, carrying the server's message
    #[error("{0}")]
    Auth(String),
    #[error("Failed to decode response: {0}")]
    Decode(String),
    #[error("Invalid input: {0}")]
    InvalidField(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            ApiError::Decode(error.to_string())
        } else {
            ApiError::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        ApiError::Decode(error.to_string())
    }
}

impl ApiError {
    /// Converts a non-2xx response into an error, preferring the server's own
    /// detail. `label` prefixes a structured `errors` object, e.g. "Submission error".
    pub fn from_response(status: u16, body: &[u8], label: Option<&str>) -> Self {
        if status == 401 {
            return ApiError::Unauthorized;
        }

        let Ok(parsed) = serde_json::from_slice::<Value>(body) else {
            return ApiError::Status { status };
        };

        if let Some(errors) = parsed.get("errors").filter(|v| !v.is_null()) {
            let prefix = label
                .map(str::to_string)
                .unwrap_or_else(|| format!("Request rejected ({})", status));
            return ApiError::Validation {
                status,
                detail: format!("{}: {}", prefix, errors),
            };
        }

        let message = ["detail", "message", "error"]
            .iter()
            .find_map(|key| parsed.get(*key).and_then(Value::as_str))
            .filter(|m| !m.trim().is_empty());

        match message {
            Some(m) => ApiError::Validation { status, detail: m.to_string() },
            None if parsed.is_object() && status == 400 => {
                // DRF field errors come back as a bare { field: [messages] } map
                let prefix = label
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Request rejected ({})", status));
                ApiError::Validation { status, detail: format!("{}: {}", prefix, parsed) }
            }
            None => ApiError::Status { status },
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

// Errors returned from axum handlers
#[derive(Debug)]
pub enum AppError {
    InternalServerError(anyhow::Error),
    Unauthorized(String),
    BadRequest(String),
    Upstream(ApiError),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::InternalServerError(error)
    }
}

impl From<ApiError> for AppError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::InvalidField(message) => AppError::BadRequest(message),
            ApiError::SessionExpired | ApiError::Unauthorized => AppError::Unauthorized(error.to_string()),
            other => AppError::Upstream(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(e) => {
                tracing::error!("Internal server error: {:?}", e);
                // Don't expose internal details to the client
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Unauthorized(message) => {
                tracing::warn!("Unauthorized: {}", message);
                return Redirect::to("/login").into_response();
            }
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::Upstream(e) => {
                tracing::warn!(error = %e, "Backend request failed");
                // Client errors from the backend pass through; anything else is its fault
                let status = match &e {
                    ApiError::Validation { status, .. } | ApiError::Status { status } => StatusCode::from_u16(*status)
                        .ok()
                        .filter(StatusCode::is_client_error)
                        .unwrap_or(StatusCode::BAD_GATEWAY),
                    _ => StatusCode::BAD_GATEWAY,
                };
                (status, e.to_string())
            }
        };

        (status, error_message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_errors_use_label() {
        let body = br#"{"errors": {"vin": ["car with this vin already exists."]}}"#;
        let err = ApiError::from_response(400, body, Some("Submission error"));
        assert_eq!(
            err.to_string(),
            r#"Submission error: {"vin":["car with this vin already exists."]}"#
        );
    }

    #[test]
    fn detail_message_is_preferred() {
        let err = ApiError::from_response(404, br#"{"detail": "Not found."}"#, None);
        assert_eq!(err.to_string(), "Not found.");
    }

    #[test]
    fn bare_field_map_on_bad_request() {
        let err = ApiError::from_response(400, br#"{"price": ["A valid number is required."]}"#, None);
        assert!(matches!(err, ApiError::Validation { status: 400, .. }));
        assert!(err.to_string().starts_with("Request rejected (400): "));
    }

    #[test]
    fn unstructured_body_falls_back_to_status() {
        let err = ApiError::from_response(500, b"<html>boom</html>", None);
        assert_eq!(err.to_string(), "Request failed with status 500");
    }

    #[test]
    fn unauthorized_wins_over_body() {
        let err = ApiError::from_response(401, br#"{"detail": "Token expired"}"#, None);
        assert!(err.is_unauthorized());
    }

    #[test]
    fn upstream_client_errors_keep_their_status() {
        let missing = AppError::Upstream(ApiError::Status { status: 404 }).into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let broken = AppError::Upstream(ApiError::Status { status: 503 }).into_response();
        assert_eq!(broken.status(), StatusCode::BAD_GATEWAY);

        let expired = AppError::from(ApiError::SessionExpired).into_response();
        assert_eq!(expired.status(), StatusCode::SEE_OTHER);
    }
}
