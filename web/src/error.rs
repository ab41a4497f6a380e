//! Error types for web handlers.
//!
//! [`AppError`] bridges [`AccessError`] and HTTP responses. The body is always
//! `{ "code": <kind>, "message": <text> }`, plus `fields` for validation failures.

use access_request_core::error::FieldError;
use access_request_core::{AccessError, ErrorKind};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;

const GENERIC_INTERNAL: &str = "An internal error occurred";

/// Application error type for web handlers.
///
/// Implements Axum's `IntoResponse`, so handlers return `Result<_, AppError>` and use
/// `?` on service calls directly.
///
/// # Examples
///
/// ```ignore
/// async fn handler(
///     State(state): State<AppState>,
///     principal: AuthenticatedPrincipal,
/// ) -> Result<Json<RequestDetail>, AppError> {
///     let detail = state.service.get_request_detail(&principal.0, id).await?;
///     Ok(Json(detail))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Stable error kind (for client error handling)
    code: String,
    /// Invalid fields, for validation failures
    fields: Option<Vec<FieldError>>,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            fields: None,
            source: None,
        }
    }

    /// Create a new error with a source error.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            message.into(),
            ErrorKind::Unauthorized.as_str().to_string(),
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            ErrorKind::StorageFailure.as_str().to_string(),
        )
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Stable error code of this error.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }
}

/// HTTP status for each error kind.
#[must_use]
pub const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::ValidationError | ErrorKind::EmptyRequest | ErrorKind::InvalidStatus => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ErrorKind::TerminalState | ErrorKind::AssetUnavailable | ErrorKind::NumberingConflict => {
            StatusCode::CONFLICT
        }
        ErrorKind::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        let kind = err.kind();
        let status = status_for(kind);
        let message = match &err {
            AccessError::StorageFailure(_) => GENERIC_INTERNAL.to_string(),
            other => other.to_string(),
        };
        let fields = match &err {
            AccessError::Validation(errors) => Some(errors.fields().to_vec()),
            _ => None,
        };

        let mut app = Self::new(status, message, kind.as_str().to_string());
        app.fields = fields;
        if status.is_server_error() {
            app = app.with_source(anyhow::Error::new(err));
        }
        app
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error kind.
    code: String,
    /// Human-readable error message.
    message: String,
    /// Invalid fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<FieldError>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    error = %source,
                    "Internal server error"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                ),
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
            fields: self.fields,
        };

        (self.status, Json(body)).into_response()
    }
}

/// Convert `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(GENERIC_INTERNAL).with_source(err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use access_request_core::authorization::{DenyReason, Permission};
    use access_request_core::types::{RequestStatus, Role};

    #[test]
    fn status_mapping_follows_error_kind() {
        let cases = [
            (AccessError::Unauthorized, StatusCode::UNAUTHORIZED),
            (AccessError::Forbidden(DenyReason::OutsideDepartment), StatusCode::FORBIDDEN),
            (AccessError::not_found("access_request", "x"), StatusCode::NOT_FOUND),
            (AccessError::invalid_field("email", "is required"), StatusCode::UNPROCESSABLE_ENTITY),
            (AccessError::EmptyRequest, StatusCode::UNPROCESSABLE_ENTITY),
            (AccessError::InvalidStatus("archived".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (AccessError::TerminalState(RequestStatus::Completed), StatusCode::CONFLICT),
            (AccessError::NumberingConflict("dup".into()), StatusCode::CONFLICT),
            (AccessError::StorageFailure("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn missing_permission_is_not_disclosed() {
        let err = AppError::from(AccessError::Forbidden(DenyReason::MissingPermission {
            role: Role::User,
            permission: Permission::Approve,
        }));
        assert_eq!(
            err.to_string(),
            "[forbidden] You do not have permission to perform this action"
        );
    }

    #[test]
    fn scope_denial_keeps_its_wording() {
        let err = AppError::from(AccessError::Forbidden(DenyReason::NotOwned));
        assert_eq!(err.to_string(), "[forbidden] Resource not owned by you");
    }

    #[test]
    fn storage_detail_is_hidden() {
        let err = AppError::from(AccessError::StorageFailure("password=hunter2".into()));
        assert!(!err.to_string().contains("hunter2"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn validation_carries_fields() {
        let err = AppError::from(AccessError::invalid_field("email", "is required"));
        assert_eq!(err.code(), "validation_error");
        assert_eq!(err.fields.as_ref().map(Vec::len), Some(1));
    }
}
