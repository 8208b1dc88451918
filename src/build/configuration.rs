//! Per-run build configuration
//!
//! Validated once at construction; an invalid verbosity never reaches the
//! packaging tool.

use crate::error::{PackError, PackResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Verbosity levels accepted by `charmcraft pack --verbosity`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Brief,
    Verbose,
    Debug,
    Trace,
}

impl Verbosity {
    /// All levels, in the order charmcraft documents them
    pub const ALL: [Verbosity; 5] = [
        Self::Quiet,
        Self::Brief,
        Self::Verbose,
        Self::Debug,
        Self::Trace,
    ];

    /// The value passed on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quiet => "quiet",
            Self::Brief => "brief",
            Self::Verbose => "verbose",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Comma-separated list of every allowed value
    pub fn allowed() -> String {
        Self::ALL
            .iter()
            .map(Verbosity::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for Verbosity {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| PackError::InvalidVerbosity {
                value: s.to_string(),
                allowed: Self::allowed(),
            })
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable configuration for one build
#[derive(Debug, Clone)]
pub struct BuildConfiguration {
    /// Directory charmcraft runs in, with `~` already expanded
    pub project_root: PathBuf,
    /// Snap channel charmcraft is installed from
    pub tool_channel: String,
    /// Pinned snap revision; empty means follow the channel
    pub tool_revision: String,
    /// `None` leaves the tool default in place
    pub verbosity: Option<Verbosity>,
    /// Whether the shared package cache is used
    pub caching_enabled: bool,
}

impl BuildConfiguration {
    /// Default snap channel when none is given
    pub const DEFAULT_CHANNEL: &'static str = "stable";

    /// Validate inputs and build the configuration.
    ///
    /// An empty `channel` falls back to [`Self::DEFAULT_CHANNEL`]; an empty
    /// `verbosity` means the tool default. Any other verbosity must be one
    /// of [`Verbosity::ALL`].
    pub fn new(
        project_root: &str,
        channel: &str,
        revision: &str,
        verbosity: &str,
        caching_enabled: bool,
    ) -> PackResult<Self> {
        let verbosity = if verbosity.is_empty() {
            None
        } else {
            Some(verbosity.parse::<Verbosity>()?)
        };

        let tool_channel = if channel.is_empty() {
            Self::DEFAULT_CHANNEL.to_string()
        } else {
            channel.to_string()
        };

        Ok(Self {
            project_root: expand_home(project_root),
            tool_channel,
            tool_revision: revision.to_string(),
            verbosity,
            caching_enabled,
        })
    }

    /// Whether charmcraft is pinned to a revision
    pub fn is_pinned(&self) -> bool {
        !self.tool_revision.is_empty()
    }
}

/// Expand a leading `~` or `~/` to the invoking user's home directory
pub fn expand_home(path: &str) -> PathBuf {
    match dirs::home_dir() {
        Some(home) => expand_home_with(path, &home),
        None => PathBuf::from(path),
    }
}

fn expand_home_with(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        home.to_path_buf()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home.join(rest)
    } else {
        PathBuf::from(path)
    }
}
