//! Dismissable messages for the user.

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// Something worked.
    Info,
    /// Something failed; the screen is still usable.
    Error,
}

/// A message the screen shows as an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Severity.
    pub level: Level,
    /// Error category, for failures.
    #[serde(skip)]
    pub kind: Option<ErrorKind>,
    /// Alert title.
    pub title: String,
    /// Alert body.
    pub message: String,
}

impl Notification {
    /// A success message.
    #[must_use]
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            kind: None,
            title: title.into(),
            message: message.into(),
        }
    }

    /// Whether this reports a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

impl From<&Error> for Notification {
    fn from(err: &Error) -> Self {
        let kind = err.kind();
        let title = match kind {
            ErrorKind::Validation => "Check your input",
            ErrorKind::Permission => "Permission required",
            ErrorKind::Capture => "Capture failed",
            ErrorKind::Network => "Upload failed",
            ErrorKind::BackendRejected => "Estimation failed",
            ErrorKind::Save => "Save failed",
            ErrorKind::Config | ErrorKind::Internal => "Error",
        };
        Self {
            level: Level::Error,
            kind: Some(kind),
            title: title.to_string(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}
