//! Orchestration of the external build toolchain
//!
//! - `provisioner`: snapd, LXD and charmcraft readiness
//! - `exec`: running the packaging command under a capability context

pub mod exec;
mod provisioner;
mod snap;
#[cfg(test)]
pub(crate) mod testing;

pub use exec::{CommandRunner, ExecContext, Invocation, ProcessRunner};
pub use provisioner::{ToolchainProvisioner, ToolchainStep};
pub use snap::SnapProvisioner;

/// Max number of output lines to include in command error messages.
const ERROR_TAIL_LINES: usize = 50;

/// Extract the useful tail of command output for error diagnostics.
///
/// Combines stdout and stderr, then returns the last `ERROR_TAIL_LINES`
/// lines so error messages are actionable without being overwhelming.
pub(crate) fn build_error_output(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout.lines().chain(stderr.lines()).collect();
    let total = lines.len();
    let tail: Vec<&str> = if total > ERROR_TAIL_LINES {
        lines[total - ERROR_TAIL_LINES..].to_vec()
    } else {
        lines
    };
    tail.join("\n")
}
