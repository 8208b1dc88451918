//! Cache key derivation
//!
//! Each scheduling attempt writes its own primary key, so concurrent
//! attempts never race on a cache slot. All attempts share the restore
//! prefix, so any of them can fall back to the newest saved cache.

use crate::error::{PackError, PackResult};
use serde::Deserialize;

/// Values that identify one scheduling attempt of a CI job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunIdentity {
    pub run_id: u64,
    /// Run attempt, or run number where attempts are unavailable
    pub run_attempt: u64,
    pub job: String,
}

impl RunIdentity {
    pub fn new(run_id: u64, run_attempt: u64, job: impl Into<String>) -> Self {
        Self {
            run_id,
            run_attempt,
            job: job.into(),
        }
    }

    /// Parse the JSON form of a GitHub `github` context.
    ///
    /// Reads `run_id`, `run_attempt` (falling back to `run_number`) and
    /// `job`. GitHub serialises the numbers as strings, so both forms are
    /// accepted.
    pub fn from_github_context(json: &str) -> PackResult<Self> {
        let context: GithubContext = serde_json::from_str(json)?;
        let run_id = context
            .run_id
            .ok_or_else(|| PackError::RunIdentity("github context has no run_id".to_string()))?
            .parse_u64("run_id")?;
        let run_attempt = context
            .run_attempt
            .or(context.run_number)
            .ok_or_else(|| {
                PackError::RunIdentity(
                    "github context has neither run_attempt nor run_number".to_string(),
                )
            })?
            .parse_u64("run_attempt")?;
        let job = context
            .job
            .ok_or_else(|| PackError::RunIdentity("github context has no job".to_string()))?;

        Ok(Self::new(run_id, run_attempt, job))
    }

    /// `runId-runAttempt-job`
    pub fn unique_token(&self) -> String {
        format!("{}-{}-{}", self.run_id, self.run_attempt, self.job)
    }
}

#[derive(Debug, Deserialize)]
struct GithubContext {
    run_id: Option<NumberOrString>,
    run_attempt: Option<NumberOrString>,
    run_number: Option<NumberOrString>,
    job: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

impl NumberOrString {
    fn parse_u64(self, field: &str) -> PackResult<u64> {
        match self {
            Self::Number(n) => Ok(n),
            Self::String(s) => s.trim().parse().map_err(|_| {
                PackError::RunIdentity(format!("{} is not a number: {:?}", field, s))
            }),
        }
    }
}

/// Primary key plus ordered fallback prefixes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub primary_key: String,
    pub restore_keys: Vec<String>,
}

impl CacheKey {
    /// Derive the key pair for a run.
    ///
    /// `primary_key` is `<prefix>-<runId>-<runAttempt>-<job>`;
    /// `restore_keys` is just `[prefix]`.
    pub fn derive(restore_prefix: &str, run: &RunIdentity) -> Self {
        Self {
            primary_key: format!("{}-{}", restore_prefix, run.unique_token()),
            restore_keys: vec![restore_prefix.to_string()],
        }
    }

    /// Every key in lookup order: primary first, then restore keys
    pub fn lookup_order(&self) -> Vec<&str> {
        std::iter::once(self.primary_key.as_str())
            .chain(self.restore_keys.iter().map(String::as_str))
            .collect()
    }
}
