//! Error types for warmvol
//!
//! All modules use `WarmvolResult<T>` as their return type.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for warmvol operations
pub type WarmvolResult<T> = Result<T, WarmvolError>;

/// All errors that can occur in warmvol
#[derive(Error, Debug)]
pub enum WarmvolError {
    // Configuration errors
    #[error("Missing required configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Instance metadata lookup failed: {0}")]
    Imds(String),

    // Cloud errors
    #[error("{operation} failed for {resource}: {reason}")]
    Cloud {
        operation: String,
        resource: String,
        reason: String,
    },

    #[error("Unexpected response from {operation}: {reason}")]
    CloudResponse { operation: String, reason: String },

    #[error("Timed out after {}s waiting for {resource} to become {target}", elapsed.as_secs())]
    WaitTimeout {
        resource: String,
        target: String,
        elapsed: Duration,
    },

    #[error("{resource} entered unexpected state {state}")]
    UnexpectedState { resource: String, state: String },

    #[error("Could not resolve the device of volume {volume_id}")]
    DeviceNotResolved { volume_id: String },

    // Mount pipeline errors
    #[error("Failed to format {device}: {reason}")]
    FormatFailed { device: String, reason: String },

    #[error("Failed to mount {device} at {mount_point}: {reason}")]
    MountFailed {
        device: String,
        mount_point: String,
        reason: String,
    },

    #[error("Failed to unmount {mount_point}: {reason}")]
    UnmountFailed { mount_point: String, reason: String },

    #[error("Service {service} failed to start: {reason}")]
    ServiceStart { service: String, reason: String },

    #[error("Health check for {service} failed, cache at {mount_point} looks corrupt: {reason}")]
    HealthProbe {
        service: String,
        mount_point: String,
        reason: String,
    },

    // Persisted state errors
    #[error("No volume info for {mount_point} at {}, nothing to snapshot", path.display())]
    VolumeInfoMissing { mount_point: String, path: PathBuf },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, output: {output}")]
    CommandExecution { command: String, output: String },

    #[error("Command timed out after {}s: {command}", timeout.as_secs())]
    CommandTimeout { command: String, timeout: Duration },

    #[error("Interrupted")]
    Interrupted,

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl WarmvolError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            output: output.into(),
        }
    }

    /// Create a cloud API error
    pub fn cloud(
        operation: impl Into<String>,
        resource: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::Cloud {
            operation: operation.into(),
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error came from a bounded wait running out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::WaitTimeout { .. } | Self::CommandTimeout { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ConfigMissing(_) => {
                Some("Pass the value as a flag or set the matching environment variable")
            }
            Self::Imds(_) => Some("Pass --instance-id and --availability-zone when not on EC2"),
            Self::VolumeInfoMissing { .. } => {
                Some("Run `warmvol restore` for this mount point first")
            }
            Self::HealthProbe { .. } => {
                Some("The next run on this branch starts from a fresh volume once a new snapshot exists")
            }
            Self::CommandFailed { .. } => Some("Check that the aws CLI and util-linux are installed"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = WarmvolError::ConfigMissing("repository");
        assert!(err.to_string().contains("repository"));
    }

    #[test]
    fn wait_timeout_display_includes_resource_and_elapsed() {
        let err = WarmvolError::WaitTimeout {
            resource: "volume vol-123".to_string(),
            target: "available".to_string(),
            elapsed: Duration::from_secs(300),
        };
        let msg = err.to_string();
        assert!(msg.contains("vol-123"));
        assert!(msg.contains("300s"));
        assert!(err.is_timeout());
    }

    #[test]
    fn error_hint() {
        let err = WarmvolError::VolumeInfoMissing {
            mount_point: "/var/lib/docker".to_string(),
            path: PathBuf::from("/tmp/snapshot-var-lib-docker.json"),
        };
        assert!(err.hint().is_some());
        assert!(WarmvolError::Interrupted.hint().is_none());
    }
}
