//! Error types for charmcraft-pack
//!
//! All modules use `PackResult<T>` as their return type.

use crate::orchestration::ToolchainStep;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for charmcraft-pack operations
pub type PackResult<T> = Result<T, PackError>;

/// All errors that can occur while packing a Charm
#[derive(Error, Debug)]
pub enum PackError {
    // Configuration errors
    #[error("Invalid verbosity \"{value}\". Allowed values are {allowed}.")]
    InvalidVerbosity { value: String, allowed: String },

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid run identity: {0}")]
    RunIdentity(String),

    // Toolchain errors
    #[error("Toolchain step '{step}' failed: {source}")]
    Toolchain {
        step: ToolchainStep,
        #[source]
        source: Box<PackError>,
    },

    // Build errors
    #[error("Build failed: {command} exited with code {code}")]
    BuildFailed { command: String, code: i32 },

    #[error("No {extension} files produced by build in {}", .root.display())]
    NoArtifactProduced { root: PathBuf, extension: String },

    #[error("Builder is in stage {actual}, expected {expected}")]
    InvalidStage {
        expected: &'static str,
        actual: &'static str,
    },

    // Cache errors
    #[error("Cache store error: {0}")]
    CacheStore(String),

    #[error("Cache service error: {context}: {reason}")]
    CacheService { context: String, reason: String },

    // Platform errors
    #[error("Invalid output '{name}': {reason}")]
    InvalidOutput { name: String, reason: String },

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

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PackError {
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
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Wrap an error as the failure of a toolchain step
    pub fn toolchain(step: ToolchainStep, source: PackError) -> Self {
        Self::Toolchain {
            step,
            source: Box::new(source),
        }
    }

    /// Create a cache service error
    pub fn cache_service(context: impl Into<String>, reason: impl ToString) -> Self {
        Self::CacheService {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if a fresh run could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Toolchain { .. } | Self::BuildFailed { .. } | Self::CommandFailed { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidVerbosity { .. } => {
                Some("Set verbosity to quiet, brief, verbose, debug or trace, or leave it empty")
            }
            Self::Toolchain {
                step: ToolchainStep::Daemon,
                ..
            } => Some("Check that snapd can be installed on this runner"),
            Self::Toolchain {
                step: ToolchainStep::Hypervisor,
                ..
            } => Some("Run: sudo lxd init --auto"),
            Self::Toolchain {
                step: ToolchainStep::PackagingTool,
                ..
            } => Some("Check the charmcraft channel and revision inputs"),
            Self::NoArtifactProduced { .. } => {
                Some("Check that charmcraft.yaml is present in the project path")
            }
            Self::CacheService { .. } => {
                Some("Set [cache] backend = \"local\" to use the on-disk cache store")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = PackError::InvalidVerbosity {
            value: "loud".to_string(),
            allowed: "quiet, brief".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid verbosity \"loud\". Allowed values are quiet, brief."
        );
    }

    #[test]
    fn toolchain_error_names_step() {
        let err = PackError::toolchain(
            ToolchainStep::Hypervisor,
            PackError::command_exec("lxd init --auto", "boom"),
        );
        let message = err.to_string();
        assert!(message.contains("hypervisor"));
        assert!(message.contains("boom"));
    }

    #[test]
    fn error_hint() {
        let err = PackError::NoArtifactProduced {
            root: PathBuf::from("proj"),
            extension: ".charm".to_string(),
        };
        assert_eq!(
            err.hint(),
            Some("Check that charmcraft.yaml is present in the project path")
        );
        assert!(PackError::Internal("x".to_string()).hint().is_none());
    }

    #[test]
    fn error_retryable() {
        let build = PackError::BuildFailed {
            command: "charmcraft pack".to_string(),
            code: 1,
        };
        assert!(build.is_retryable());
        let config = PackError::InvalidVerbosity {
            value: "x".to_string(),
            allowed: String::new(),
        };
        assert!(!config.is_retryable());
    }
}
