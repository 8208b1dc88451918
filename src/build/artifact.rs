//! Artifact discovery
//!
//! charmcraft writes the packed Charm into the project root. This module
//! finds it; it never creates or modifies artifacts.

use crate::error::{PackError, PackResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Result of a successful artifact lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    /// Selected artifact, `project_root` joined with the file name
    pub path: PathBuf,
    /// Every matching file name, in selection order
    pub candidates: Vec<String>,
}

impl ResolvedArtifact {
    /// Whether more than one artifact matched
    pub fn multiple_found(&self) -> bool {
        self.candidates.len() > 1
    }
}

/// Finds the artifact produced by a build
#[derive(Debug, Clone)]
pub struct ArtifactResolver {
    extension: String,
    sort: bool,
}

impl ArtifactResolver {
    /// Create a resolver for files ending in `extension`.
    ///
    /// With `sort` set, candidates are ordered by name before the first is
    /// picked; otherwise directory-listing order decides.
    pub fn new(extension: impl Into<String>, sort: bool) -> Self {
        Self {
            extension: extension.into(),
            sort,
        }
    }

    /// Scan the immediate entries of `root` and select one artifact
    pub async fn resolve(&self, root: &Path) -> PackResult<ResolvedArtifact> {
        let names = list_dir(root).await?;
        let candidates = self.select(names);

        let Some(first) = candidates.first() else {
            return Err(PackError::NoArtifactProduced {
                root: root.to_path_buf(),
                extension: self.extension.clone(),
            });
        };

        if candidates.len() > 1 {
            warn!(
                "Multiple artifacts found in {}: {}",
                root.display(),
                candidates.join(", ")
            );
        }

        let path = root.join(first);
        debug!("Resolved artifact: {}", path.display());
        Ok(ResolvedArtifact { path, candidates })
    }

    fn select(&self, names: Vec<String>) -> Vec<String> {
        let mut matches: Vec<String> = names
            .into_iter()
            .filter(|name| name.ends_with(&self.extension))
            .collect();
        if self.sort {
            matches.sort();
        }
        matches
    }
}

impl Default for ArtifactResolver {
    fn default() -> Self {
        Self::new(".charm", true)
    }
}

async fn list_dir(root: &Path) -> PackResult<Vec<String>> {
    let mut entries = fs::read_dir(root)
        .await
        .map_err(|e| PackError::io(format!("reading directory {}", root.display()), e))?;

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PackError::io(format!("reading entry in {}", root.display()), e))?
    {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}
