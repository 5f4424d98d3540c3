use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chirp_core::AuthError;
use serde_json::json;

#[derive(Debug)]
pub struct ApiError {
    code: &'static str,
    message: String,
    status: StatusCode,
}

impl ApiError {
    pub fn new(code: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new("Unauthorized", StatusCode::UNAUTHORIZED, "unauthorized")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BadRequest", StatusCode::BAD_REQUEST, message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new("TooManyRequests", StatusCode::TOO_MANY_REQUESTS, message)
    }

    pub fn internal() -> Self {
        Self::new("Error", StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotFound(id) => {
                ApiError::new("NotFound", StatusCode::NOT_FOUND, format!("{id} not found"))
            }
            AuthError::AlreadyExists(id) => ApiError::new(
                "AlreadyExists",
                StatusCode::CONFLICT,
                format!("{id} already exists"),
            ),
            AuthError::InvalidCredentials => ApiError::new(
                "InvalidCredentials",
                StatusCode::UNAUTHORIZED,
                "invalid credentials",
            ),
            AuthError::InvalidOrExpired => ApiError::new(
                "InvalidOrExpired",
                StatusCode::UNAUTHORIZED,
                "code invalid or expired",
            ),
            AuthError::Unauthorized(msg) => {
                ApiError::new("Unauthorized", StatusCode::UNAUTHORIZED, msg)
            }
            AuthError::Cancelled(msg) => ApiError::new("Cancelled", StatusCode::BAD_REQUEST, msg),
            AuthError::Upstream(msg) => {
                tracing::error!(error = %msg, "identity provider failure");
                ApiError::new(
                    "Upstream",
                    StatusCode::BAD_GATEWAY,
                    "identity provider unavailable",
                )
            }
            // 内部错误细节只进日志，不回给客户端
            AuthError::Mail(msg) | AuthError::Other(msg) => {
                tracing::error!(error = %msg, "internal error");
                ApiError::internal()
            }
            AuthError::Io(e) => {
                tracing::error!(error = %e, "storage io error");
                ApiError::internal()
            }
            AuthError::Serde(e) => {
                tracing::error!(error = %e, "storage serde error");
                ApiError::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "code": self.code,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}
