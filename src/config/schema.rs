//! Configuration schema for charmcraft-pack
//!
//! Configuration is stored at `~/.config/charmcraft-pack/config.toml`.
//! Every field has a default, so the file is optional.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Package cache settings
    pub cache: CacheConfig,

    /// Toolchain and invocation settings
    pub toolchain: ToolchainConfig,

    /// Artifact discovery settings
    pub build: BuildConfig,
}

/// Package cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Local directory charmcraft uses as its shared package cache
    pub dir: PathBuf,

    /// Restore-key prefix shared by every run that may reuse a cache
    pub restore_key: String,

    /// Where the local cache store keeps saved entries
    pub store_dir: PathBuf,

    /// Environment variable that points charmcraft at `dir`
    pub env_var: String,

    /// Which cache store to use
    pub backend: CacheBackend,

    /// Entries kept per restore key in the local store (0 = keep all)
    pub keep_entries: u32,
}

/// Cache store selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Actions cache service when the runner exposes it, local store otherwise
    #[default]
    Auto,
    /// Always use the local directory store
    Local,
    /// Always use the Actions cache service
    Actions,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/tmp/charmcraft-cache"),
            restore_key: "craft-shared-cache".to_string(),
            store_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join("charmcraft-pack")
                .join("store"),
            env_var: "CRAFT_SHARED_CACHE".to_string(),
            backend: CacheBackend::Auto,
            keep_entries: 2,
        }
    }
}

/// Toolchain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Packaging command
    pub command: String,

    /// Group whose privileges the hypervisor requires (empty = run directly)
    pub group: String,

    /// Snap client binary
    pub snap: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            command: "charmcraft".to_string(),
            group: "lxd".to_string(),
            snap: "snap".to_string(),
        }
    }
}

/// Artifact discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// File name suffix of a packed Charm
    pub artifact_extension: String,

    /// Sort candidates by name before picking the first
    pub sort_artifacts: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            artifact_extension: ".charm".to_string(),
            sort_artifacts: true,
        }
    }
}
