use alerting::{AlertsClientError, FactoryError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use control_plane::{BootstrapError, ConfigError, RuleTypeError, SecurityError, StoreError};
use serde::Serialize;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.status.as_str().to_string(),
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<AlertsClientError> for AppError {
    fn from(err: AlertsClientError) -> Self {
        let message = err.to_string();
        match err {
            AlertsClientError::Store(StoreError::NotFound { .. }) => AppError::not_found(message),
            AlertsClientError::Store(StoreError::Conflict { .. }) => AppError::conflict(message),
            AlertsClientError::Security(err) => err.into(),
            AlertsClientError::RuleType(RuleTypeError::NotRegistered(_))
            | AlertsClientError::InvalidInterval(_)
            | AlertsClientError::InvalidActionGroup(_)
            | AlertsClientError::UnknownAction(_) => AppError::bad_request(message),
            _ => AppError::internal(message),
        }
    }
}

impl From<SecurityError> for AppError {
    fn from(err: SecurityError) -> Self {
        let message = err.to_string();
        match err {
            SecurityError::Unauthorized(_) => AppError::unauthorized(message),
            SecurityError::Forbidden(_) => AppError::forbidden(message),
            SecurityError::UnsupportedScheme(_) => AppError::bad_request(message),
            SecurityError::Cluster { .. } | SecurityError::Transport(_) => {
                AppError::new(StatusCode::BAD_GATEWAY, message)
            }
        }
    }
}

impl From<FactoryError> for AppError {
    fn from(err: FactoryError) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<BootstrapError> for AppError {
    fn from(err: BootstrapError) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::bad_request(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status.as_str(), self.message)
    }
}

impl std::error::Error for AppError {}
