//! Device permission state shared by the camera, sensor and media seams.

/// Whether a device capability may be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionState {
    /// Whether access is currently granted.
    pub is_granted: bool,

    /// Human-readable description of the status.
    pub description: String,
}

impl PermissionState {
    /// Create a new granted state.
    #[must_use]
    pub fn granted() -> Self {
        Self {
            is_granted: true,
            description: "permission granted".to_string(),
        }
    }

    /// Create a new denied state.
    #[must_use]
    pub fn denied(description: impl Into<String>) -> Self {
        Self {
            is_granted: false,
            description: description.into(),
        }
    }

    /// Fail with a permission error naming `permission` when not granted.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PermissionMissing`] when access is denied.
    pub fn require(&self, permission: &str) -> crate::Result<()> {
        if self.is_granted {
            Ok(())
        } else {
            Err(crate::Error::permission_missing(
                permission,
                format!(
                    "{}. Grant {permission} access in the system settings and reopen the screen.",
                    self.description
                ),
            ))
        }
    }
}

impl From<glowfam_device::PermissionStatus> for PermissionState {
    fn from(status: glowfam_device::PermissionStatus) -> Self {
        Self {
            is_granted: status.is_granted,
            description: status.description,
        }
    }
}
