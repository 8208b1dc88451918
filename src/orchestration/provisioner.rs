//! Toolchain provisioning abstraction
//!
//! Provides a trait for the three steps that make a runner able to pack
//! Charms. Implementations must make every step idempotent.

use crate::error::PackResult;
use async_trait::async_trait;
use std::fmt;

/// Identifies a provisioning step in errors and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainStep {
    /// Package-manager daemon (snapd)
    Daemon,
    /// Container hypervisor (LXD)
    Hypervisor,
    /// The packaging CLI (charmcraft)
    PackagingTool,
}

impl fmt::Display for ToolchainStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Daemon => "daemon",
            Self::Hypervisor => "hypervisor",
            Self::PackagingTool => "packaging-tool",
        };
        write!(f, "{}", name)
    }
}

/// Ensures the build toolchain is present and ready
///
/// Retrying is the implementation's business; callers invoke each step
/// once and treat an error as fatal.
#[async_trait]
pub trait ToolchainProvisioner: Send + Sync {
    /// Ensure the package-manager daemon is installed and seeded
    async fn ensure_daemon_ready(&self) -> PackResult<()>;

    /// Ensure the container hypervisor is installed and initialised
    async fn ensure_hypervisor_ready(&self) -> PackResult<()>;

    /// Ensure the packaging tool is installed from `channel`, or at
    /// `revision` when that is non-empty
    async fn ensure_tool_installed(&self, channel: &str, revision: &str) -> PackResult<()>;

    /// Human-readable provisioner name for display
    fn provisioner_name(&self) -> &'static str;
}
