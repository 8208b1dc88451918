//! CLI argument definitions using clap derive
//!
//! Every action input can also come from the `INPUT_*` variable GitHub
//! Actions sets for it; run identity comes from the `GITHUB_*` variables.

use crate::cache::RunIdentity;
use crate::error::{PackError, PackResult};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// charmcraft-pack - Build Charms with charmcraft in CI
///
/// Installs snapd, LXD and charmcraft, runs `charmcraft pack` and reports
/// the packed Charm, optionally reusing a keyed package cache.
#[derive(Parser, Debug)]
#[command(name = "charmcraft-pack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "CHARMCRAFT_PACK_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a Charm and set the `charm` output
    Pack(PackArgs),

    /// Restore the package cache only (pre-build step)
    Restore(RestoreArgs),
}

/// Arguments for the pack command
#[derive(Parser, Debug)]
pub struct PackArgs {
    /// Project directory to build in
    #[arg(long, env = "INPUT_PATH", default_value = ".")]
    pub path: String,

    /// Pinned charmcraft snap revision (empty = follow the channel)
    #[arg(long, env = "INPUT_REVISION", default_value = "")]
    pub revision: String,

    /// charmcraft snap channel
    #[arg(long, env = "INPUT_CHARMCRAFT-CHANNEL", default_value = "stable")]
    pub channel: String,

    /// charmcraft pack verbosity: quiet, brief, verbose, debug or trace
    #[arg(long, env = "INPUT_VERBOSITY", default_value = "")]
    pub verbosity: String,

    #[command(flatten)]
    pub cache: CacheArgs,
}

/// Arguments for the restore command
#[derive(Parser, Debug)]
pub struct RestoreArgs {
    #[command(flatten)]
    pub cache: CacheArgs,
}

/// Package cache switch and run identity
#[derive(Args, Debug, Default)]
pub struct CacheArgs {
    /// Cache charmcraft's packages between runs ("true" enables)
    #[arg(long, env = "INPUT_CACHE-PACKAGES", default_value = "false")]
    pub cache_packages: String,

    /// CI run id
    #[arg(long, env = "GITHUB_RUN_ID")]
    pub run_id: Option<u64>,

    /// CI run attempt
    #[arg(long, env = "GITHUB_RUN_ATTEMPT")]
    pub run_attempt: Option<u64>,

    /// CI run number, used when no attempt is known
    #[arg(long, env = "GITHUB_RUN_NUMBER")]
    pub run_number: Option<u64>,

    /// CI job name
    #[arg(long, env = "GITHUB_JOB")]
    pub job: Option<String>,

    /// JSON `github` context; explicit run flags take precedence
    #[arg(long, env = "INPUT_GITHUB_CONTEXT")]
    pub github_context: Option<String>,
}

impl CacheArgs {
    /// Whether the package cache is enabled
    pub fn caching_enabled(&self) -> bool {
        self.cache_packages.trim().eq_ignore_ascii_case("true")
    }

    /// Identity of this run, for cache keys
    pub fn run_identity(&self) -> PackResult<RunIdentity> {
        let context = match self.github_context.as_deref().map(str::trim) {
            Some(json) if !json.is_empty() => Some(RunIdentity::from_github_context(json)?),
            _ => None,
        };

        let run_id = self.run_id.or(context.as_ref().map(|c| c.run_id));
        let run_attempt = self
            .run_attempt
            .or(self.run_number)
            .or(context.as_ref().map(|c| c.run_attempt));
        let job = self
            .job
            .clone()
            .filter(|j| !j.is_empty())
            .or(context.map(|c| c.job));

        match (run_id, run_attempt, job) {
            (Some(run_id), Some(run_attempt), Some(job)) => {
                Ok(RunIdentity::new(run_id, run_attempt, job))
            }
            _ => Err(PackError::RunIdentity(
                "run id, run attempt and job are required for caching".to_string(),
            )),
        }
    }
}
