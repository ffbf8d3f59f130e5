use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Error mirror of the success envelope: `{success: false, message}`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    TooManyRequests(&'static str),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    /// Foreign key violations on delete surface as 409, anything else as 500.
    pub(crate) fn conflict_on_fk(err: sqlx::Error, conflict: &str, context: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23503") {
                return Self::Conflict(conflict.to_string());
            }
        }
        Self::internal(err, context)
    }
}

fn body(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorBody { success: false, message })).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(message) => {
                let mut response = body(StatusCode::UNAUTHORIZED, message.to_string());
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            ApiError::Forbidden(message) => body(StatusCode::FORBIDDEN, message.to_string()),
            ApiError::BadRequest(message) => body(StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => body(StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => body(StatusCode::CONFLICT, message),
            ApiError::TooManyRequests(message) => {
                body(StatusCode::TOO_MANY_REQUESTS, message.to_string())
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                body(StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        }
    }
}
