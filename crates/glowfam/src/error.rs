//! Error types for glowfam.
//!
//! This module defines all error types used throughout the glowfam crate and
//! maps each of them onto the small set of categories the capture screen
//! reports to the user.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for glowfam operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Input Errors ===
    /// The reference height is empty, not a number, or not positive.
    #[error("invalid reference height {input:?}: enter a positive height in centimeters")]
    InvalidReferenceHeight {
        /// What the user typed.
        input: String,
    },

    /// An operation was attempted in the wrong step of the flow.
    #[error("cannot {action} while {step}")]
    InvalidState {
        /// What was attempted.
        action: &'static str,
        /// The current step.
        step: crate::session::Step,
    },

    /// A countdown or upload is already running.
    #[error("a capture is already in progress")]
    CaptureInProgress,

    /// The screen was closed; late results are dropped.
    #[error("the capture screen was closed")]
    ScreenClosed,

    // === Device Errors ===
    /// Required device permission is missing.
    #[error("missing permission: {permission}. {instructions}")]
    PermissionMissing {
        /// Name of the required permission.
        permission: String,
        /// Instructions for granting the permission.
        instructions: String,
    },

    /// The camera failed to take a picture.
    #[error("photo capture failed: {0}")]
    Capture(String),

    /// The orientation sensor could not be subscribed.
    #[error("orientation sensor error: {0}")]
    Sensor(String),

    // === Backend Errors ===
    /// The HTTP request failed.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend reported `success: false`.
    #[error("backend rejected the request: {message}")]
    BackendRejected {
        /// Message returned by the backend.
        message: String,
    },

    /// The backend answered with something we cannot use.
    #[error("malformed backend response: {message}")]
    MalformedResponse {
        /// What was wrong with the payload.
        message: String,
    },

    /// An operation timed out.
    #[error("operation timed out: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
    },

    /// Persisting the result failed.
    #[error("failed to save {what}: {message}")]
    Save {
        /// What was being saved.
        what: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 image payload could not be decoded.
    #[error("invalid base64 image: {0}")]
    Base64(#[from] base64::DecodeError),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for glowfam operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

/// User-facing error categories.
///
/// Every [`Error`] belongs to exactly one of these. None of them is fatal:
/// the screen stays interactive and the user decides whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad user input.
    Validation,
    /// Camera, motion or media library access denied.
    Permission,
    /// Photo capture failed.
    Capture,
    /// Upload failed, timed out, or the response was unusable.
    Network,
    /// Backend answered `success: false`.
    BackendRejected,
    /// Saving the measurement or image failed.
    Save,
    /// Configuration could not be loaded.
    Config,
    /// Anything else.
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Permission => write!(f, "permission"),
            Self::Capture => write!(f, "capture"),
            Self::Network => write!(f, "network"),
            Self::BackendRejected => write!(f, "backend_rejected"),
            Self::Save => write!(f, "save"),
            Self::Config => write!(f, "config"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

impl Error {
    /// Create a new capture error.
    #[must_use]
    pub fn capture(message: impl Into<String>) -> Self {
        Self::Capture(message.into())
    }

    /// Create a new sensor error.
    #[must_use]
    pub fn sensor(message: impl Into<String>) -> Self {
        Self::Sensor(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a malformed response error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Create a backend rejection error.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::BackendRejected {
            message: message.into(),
        }
    }

    /// Create a save error.
    #[must_use]
    pub fn save(what: &'static str, message: impl Into<String>) -> Self {
        Self::Save {
            what,
            message: message.into(),
        }
    }

    /// Create a permission missing error with instructions.
    #[must_use]
    pub fn permission_missing(
        permission: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self::PermissionMissing {
            permission: permission.into(),
            instructions: instructions.into(),
        }
    }

    /// The user-facing category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidReferenceHeight { .. }
            | Self::InvalidState { .. }
            | Self::CaptureInProgress => ErrorKind::Validation,
            Self::PermissionMissing { .. } | Self::Sensor(_) => ErrorKind::Permission,
            Self::Capture(_) => ErrorKind::Capture,
            Self::Network(_)
            | Self::MalformedResponse { .. }
            | Self::Timeout { .. }
            | Self::Base64(_) => ErrorKind::Network,
            Self::BackendRejected { .. } => ErrorKind::BackendRejected,
            Self::Save { .. } => ErrorKind::Save,
            Self::ConfigLoad(_) | Self::ConfigValidation { .. } => ErrorKind::Config,
            Self::ScreenClosed
            | Self::Io(_)
            | Self::DirectoryCreate { .. }
            | Self::Json(_)
            | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Check if this error is a permission issue.
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(self, Self::PermissionMissing { .. })
    }

    /// Check if this error came from talking to the backend.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Network | ErrorKind::BackendRejected
        )
    }
}
