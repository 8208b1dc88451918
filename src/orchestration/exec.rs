//! External command invocation
//!
//! An [`Invocation`] describes what to run; a [`CommandRunner`] runs it.
//! The capability context (e.g. `sg lxd -c ...`) is applied by the runner,
//! so the recorded argument list stays exactly what the tool receives.

use crate::error::{PackError, PackResult};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Privilege context a command runs under
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecContext {
    /// Run the program as is
    Direct,
    /// Run through `sg <group> -c "<command line>"`
    Group(String),
}

impl ExecContext {
    /// Group context for `group`, or [`ExecContext::Direct`] when empty
    pub fn from_group(group: &str) -> Self {
        if group.is_empty() {
            Self::Direct
        } else {
            Self::Group(group.to_string())
        }
    }

    /// Program and arguments to spawn for `program args...`
    pub fn wrap(&self, program: &str, args: &[String]) -> (String, Vec<String>) {
        match self {
            Self::Direct => (program.to_string(), args.to_vec()),
            Self::Group(group) => (
                "sg".to_string(),
                vec![group.clone(), "-c".to_string(), command_line(program, args)],
            ),
        }
    }
}

/// A fully specified external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Extra environment on top of the inherited one
    pub env: Vec<(String, String)>,
    pub context: ExecContext,
}

impl Invocation {
    /// Shell-style rendering of program and arguments, without the context
    pub fn display(&self) -> String {
        command_line(&self.program, &self.args)
    }
}

/// Runs invocations and reports their exit code
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion. Output is passed through, not captured.
    async fn run(&self, invocation: &Invocation) -> PackResult<i32>;
}

/// Runs invocations as child processes with inherited stdio
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> PackResult<i32> {
        let (program, args) = invocation.context.wrap(&invocation.program, &invocation.args);
        debug!(
            "Executing in {}: {} {:?}",
            invocation.cwd.display(),
            program,
            args
        );

        let status = Command::new(&program)
            .args(&args)
            .current_dir(&invocation.cwd)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| PackError::command_failed(invocation.display(), e))?;

        // Killed by a signal
        Ok(status.code().unwrap_or(-1))
    }
}

/// Join program and arguments into a single POSIX shell command line
pub fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(shell_quote)
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+,".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}
