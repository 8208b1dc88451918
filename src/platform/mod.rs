//! CI platform input/output
//!
//! Annotations, log groups and step outputs go through [`PlatformIo`] so the
//! pipeline does not depend on one CI system's workflow commands.

mod github;

pub use github::GithubActions;

use crate::error::PackResult;

/// Output side of the CI platform
pub trait PlatformIo: Send + Sync {
    /// Plain informational line
    fn info(&self, message: &str);

    /// Non-fatal warning annotation
    fn warning(&self, message: &str);

    /// Open a collapsible log group
    fn start_group(&self, name: &str);

    /// Close the current log group
    fn end_group(&self);

    /// Publish a step output
    fn set_output(&self, name: &str, value: &str) -> PackResult<()>;

    /// Mark the step as failed with `message`
    fn set_failed(&self, message: &str);
}
