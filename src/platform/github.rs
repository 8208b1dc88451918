//! GitHub Actions workflow commands

use crate::error::{PackError, PackResult};
use crate::platform::PlatformIo;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

/// Writes workflow commands to stdout and outputs to `$GITHUB_OUTPUT`
#[derive(Debug, Clone, Default)]
pub struct GithubActions {
    output_file: Option<PathBuf>,
}

impl GithubActions {
    /// Detect the output file from the environment
    pub fn from_env() -> Self {
        let output_file = std::env::var_os("GITHUB_OUTPUT")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self { output_file }
    }

    /// Use an explicit output file
    pub fn with_output_file(path: PathBuf) -> Self {
        Self {
            output_file: Some(path),
        }
    }
}

impl PlatformIo for GithubActions {
    fn info(&self, message: &str) {
        println!("{}", message);
    }

    fn warning(&self, message: &str) {
        println!("::warning::{}", escape_data(message));
    }

    fn start_group(&self, name: &str) {
        println!("::group::{}", escape_data(name));
    }

    fn end_group(&self) {
        println!("::endgroup::");
    }

    fn set_output(&self, name: &str, value: &str) -> PackResult<()> {
        let Some(path) = &self.output_file else {
            println!("::set-output name={}::{}", name, escape_data(value));
            return Ok(());
        };

        let delimiter = format!("ghadelimiter_{}", Uuid::new_v4());
        let record = output_record(name, value, &delimiter)?;

        debug!("Writing output {} to {}", name, path.display());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| PackError::io(format!("opening {}", path.display()), e))?;
        file.write_all(record.as_bytes())
            .map_err(|e| PackError::io(format!("writing {}", path.display()), e))
    }

    fn set_failed(&self, message: &str) {
        println!("::error::{}", escape_data(message));
    }
}

/// Format an output as a heredoc block closed by `delimiter`
///
/// The delimiter must not appear in the name or value, otherwise the value
/// could end the block early and inject further outputs.
fn output_record(name: &str, value: &str, delimiter: &str) -> PackResult<String> {
    if name.is_empty() || name.contains(['\n', '\r']) {
        return Err(PackError::InvalidOutput {
            name: name.to_string(),
            reason: "name must be a single non-empty line".to_string(),
        });
    }
    if name.contains(delimiter) || value.contains(delimiter) {
        return Err(PackError::InvalidOutput {
            name: name.to_string(),
            reason: format!("value contains the delimiter {}", delimiter),
        });
    }
    Ok(format!("{name}<<{delimiter}\n{value}\n{delimiter}\n"))
}

/// Escape a workflow command message
fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn escapes_newlines_and_percent() {
        assert_eq!(escape_data("50%\nnext\r"), "50%25%0Anext%0D");
    }

    #[test]
    fn set_output_appends_to_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("output");
        std::fs::write(&path, "earlier=1\n").unwrap();

        let github = GithubActions::with_output_file(path.clone());
        github.set_output("charm", "/proj/app.charm").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "earlier=1");
        let delimiter = lines[1].strip_prefix("charm<<").unwrap();
        assert!(delimiter.starts_with("ghadelimiter_"));
        assert_eq!(lines[2], "/proj/app.charm");
        assert_eq!(lines[3], delimiter);
    }

    #[test]
    fn multiline_value_stays_inside_block() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("output");

        let github = GithubActions::with_output_file(path.clone());
        github
            .set_output("charm", "/proj/x\nevil=1/app.charm")
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.lines().any(|line| line.starts_with("evil=")));
        let delimiter = content.lines().next().unwrap().strip_prefix("charm<<").unwrap();
        assert_eq!(
            content,
            format!("charm<<{delimiter}\n/proj/x\nevil=1/app.charm\n{delimiter}\n")
        );
    }

    #[test]
    fn output_record_rejects_delimiter_in_value() {
        let err = output_record("charm", "a\nEOF\nb", "EOF").unwrap_err();
        assert!(matches!(err, PackError::InvalidOutput { .. }));

        let err = output_record("EOF", "a", "EOF").unwrap_err();
        assert!(matches!(err, PackError::InvalidOutput { .. }));
    }

    #[test]
    fn output_record_rejects_multiline_name() {
        assert!(output_record("charm\nevil", "a", "EOF").is_err());
        assert!(output_record("", "a", "EOF").is_err());
    }

    #[test]
    #[serial]
    fn from_env_reads_github_output() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("output");
        std::env::set_var("GITHUB_OUTPUT", &path);
        let github = GithubActions::from_env();
        std::env::remove_var("GITHUB_OUTPUT");

        assert_eq!(github.output_file, Some(path));
    }

    #[test]
    #[serial]
    fn from_env_without_output_file() {
        std::env::remove_var("GITHUB_OUTPUT");
        assert!(GithubActions::from_env().output_file.is_none());
    }
}
