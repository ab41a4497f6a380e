//! Error types for access request operations.

use crate::authorization::DenyReason;
use crate::types::{AssetId, RequestStatus};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result type alias for access request operations.
pub type Result<T> = std::result::Result<T, AccessError>;

/// Error taxonomy for every operation exposed by the orchestration facade.
///
/// Each variant maps to exactly one stable [`ErrorKind`]; the `Display` text is the
/// caller-facing message.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AccessError {
    // ═══════════════════════════════════════════════════════════
    // Caller Errors
    // ═══════════════════════════════════════════════════════════

    /// No principal, or a principal that could not be understood.
    #[error("Authentication required")]
    Unauthorized,

    /// Authenticated, but not permitted (including out-of-scope resources).
    #[error("{0}")]
    Forbidden(DenyReason),

    /// Request, handover item or asset does not exist.
    #[error("{resource} {id} not found")]
    NotFound {
        /// Kind of entity that was looked up
        resource: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Malformed or missing input fields.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Neither a system grant nor a hardware item was requested.
    #[error("An access request must include at least one system grant or hardware item")]
    EmptyRequest,

    // ═══════════════════════════════════════════════════════════
    // Lifecycle Errors
    // ═══════════════════════════════════════════════════════════

    /// Target status is not one of the known statuses.
    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    /// Current status is terminal.
    #[error("Request is {0} and can no longer change status")]
    TerminalState(RequestStatus),

    /// Link target is not free.
    #[error("Asset {asset_id} is not available (status: {status})")]
    AssetUnavailable {
        /// Asset that was requested
        asset_id: AssetId,
        /// Its current inventory status
        status: String,
    },

    // ═══════════════════════════════════════════════════════════
    // Infrastructure Errors
    // ═══════════════════════════════════════════════════════════

    /// Request number collided and the retry was exhausted.
    #[error("Request number conflict: {0}")]
    NumberingConflict(String),

    /// Storage collaborator failed; the operation was rolled back.
    #[error("Storage failure: {0}")]
    StorageFailure(String),
}

impl AccessError {
    /// Shorthand for [`AccessError::NotFound`].
    #[must_use]
    pub fn not_found(resource: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Single-field validation failure.
    #[must_use]
    pub fn invalid_field(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::default();
        errors.push(field, message);
        Self::Validation(errors)
    }

    /// Stable kind for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::EmptyRequest => ErrorKind::EmptyRequest,
            Self::InvalidStatus(_) => ErrorKind::InvalidStatus,
            Self::TerminalState(_) => ErrorKind::TerminalState,
            Self::AssetUnavailable { .. } => ErrorKind::AssetUnavailable,
            Self::NumberingConflict(_) => ErrorKind::NumberingConflict,
            Self::StorageFailure(_) => ErrorKind::StorageFailure,
        }
    }

    /// Returns `true` if the caller can fix the error by changing the input.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::EmptyRequest
                | Self::InvalidStatus(_)
                | Self::TerminalState(_)
                | Self::AssetUnavailable { .. }
        )
    }

    /// Returns `true` if the whole operation may succeed when repeated.
    ///
    /// Business rejections are never retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NumberingConflict(_) | Self::StorageFailure(_))
    }
}

/// Stable, machine-readable error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`AccessError::Unauthorized`]
    Unauthorized,
    /// See [`AccessError::Forbidden`]
    Forbidden,
    /// See [`AccessError::NotFound`]
    NotFound,
    /// See [`AccessError::Validation`]
    ValidationError,
    /// See [`AccessError::EmptyRequest`]
    EmptyRequest,
    /// See [`AccessError::InvalidStatus`]
    InvalidStatus,
    /// See [`AccessError::TerminalState`]
    TerminalState,
    /// See [`AccessError::AssetUnavailable`]
    AssetUnavailable,
    /// See [`AccessError::NumberingConflict`]
    NumberingConflict,
    /// See [`AccessError::StorageFailure`]
    StorageFailure,
}

impl ErrorKind {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::ValidationError => "validation_error",
            Self::EmptyRequest => "empty_request",
            Self::InvalidStatus => "invalid_status",
            Self::TerminalState => "terminal_state",
            Self::AssetUnavailable => "asset_unavailable",
            Self::NumberingConflict => "numbering_conflict",
            Self::StorageFailure => "storage_failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single invalid input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name as it appears in the request body
    pub field: &'static str,
    /// What is wrong with it
    pub message: String,
}

/// Every invalid field found while validating one input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    /// Record a failing field.
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    /// No failures recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Failures in the order they were found.
    #[must_use]
    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    /// `Ok(())` when empty, otherwise [`AccessError::Validation`].
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Validation`] carrying every recorded failure.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AccessError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, error) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}
