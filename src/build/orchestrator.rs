//! Build orchestrator
//!
//! Drives one build through a one-way sequence of stages:
//!
//! ```text
//! Unconfigured -> ToolchainReady -> Packed -> ArtifactResolved
//!       \               \              \
//!        +---------------+--------------+--> Failed
//! ```
//!
//! A failed builder stays failed; retrying means constructing a new one.

use crate::build::artifact::ArtifactResolver;
use crate::build::configuration::BuildConfiguration;
use crate::error::{PackError, PackResult};
use crate::orchestration::{
    CommandRunner, ExecContext, Invocation, ToolchainProvisioner, ToolchainStep,
};
use crate::platform::PlatformIo;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

/// Where a builder is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Unconfigured,
    ToolchainReady,
    Packed,
    ArtifactResolved,
    Failed,
}

impl BuildStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::ToolchainReady => "toolchain-ready",
            Self::Packed => "packed",
            Self::ArtifactResolved => "artifact-resolved",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared package cache directory handed to the packaging tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedCache {
    /// Environment variable the tool reads
    pub env_var: String,
    /// Directory the variable points at
    pub dir: PathBuf,
}

/// Packs one Charm
pub struct Builder {
    config: BuildConfiguration,
    provisioner: Arc<dyn ToolchainProvisioner>,
    runner: Arc<dyn CommandRunner>,
    resolver: ArtifactResolver,
    command: String,
    context: ExecContext,
    shared_cache: Option<SharedCache>,
    stage: BuildStage,
}

impl Builder {
    /// Create a builder with charmcraft run under the `lxd` group
    pub fn new(
        config: BuildConfiguration,
        provisioner: Arc<dyn ToolchainProvisioner>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            config,
            provisioner,
            runner,
            resolver: ArtifactResolver::default(),
            command: "charmcraft".to_string(),
            context: ExecContext::Group("lxd".to_string()),
            shared_cache: None,
            stage: BuildStage::Unconfigured,
        }
    }

    /// Override the packaging command
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// Override the capability context the command runs under
    pub fn with_exec_context(mut self, context: ExecContext) -> Self {
        self.context = context;
        self
    }

    /// Override artifact discovery
    pub fn with_resolver(mut self, resolver: ArtifactResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Point the packaging tool at a shared package cache
    pub fn with_shared_cache(mut self, shared_cache: SharedCache) -> Self {
        self.shared_cache = Some(shared_cache);
        self
    }

    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    /// Ensure snapd, LXD and charmcraft are ready, in that order
    pub async fn provision_toolchain(&mut self, io: &dyn PlatformIo) -> PackResult<()> {
        self.expect_stage(BuildStage::Unconfigured)?;
        debug!("Provisioning with {}", self.provisioner.provisioner_name());

        io.start_group("Installing Charmcraft plus dependencies");
        let result = self.ensure_toolchain().await;
        io.end_group();

        self.advance(result, BuildStage::ToolchainReady)
    }

    async fn ensure_toolchain(&self) -> PackResult<()> {
        self.provisioner
            .ensure_daemon_ready()
            .await
            .map_err(|e| PackError::toolchain(ToolchainStep::Daemon, e))?;
        self.provisioner
            .ensure_hypervisor_ready()
            .await
            .map_err(|e| PackError::toolchain(ToolchainStep::Hypervisor, e))?;
        self.provisioner
            .ensure_tool_installed(&self.config.tool_channel, &self.config.tool_revision)
            .await
            .map_err(|e| PackError::toolchain(ToolchainStep::PackagingTool, e))
    }

    /// Arguments to the packaging command.
    ///
    /// Always `pack`, plus `--verbosity <level>` when a level is set.
    /// Nothing else is ever passed.
    pub fn pack_args(&self) -> Vec<String> {
        let mut args = vec!["pack".to_string()];
        if let Some(verbosity) = self.config.verbosity {
            args.push("--verbosity".to_string());
            args.push(verbosity.to_string());
        }
        args
    }

    /// The full invocation `invoke_pack` will run
    pub fn invocation(&self) -> Invocation {
        let env = self
            .shared_cache
            .iter()
            .map(|cache| (cache.env_var.clone(), cache.dir.display().to_string()))
            .collect();

        Invocation {
            program: self.command.clone(),
            args: self.pack_args(),
            cwd: self.config.project_root.clone(),
            env,
            context: self.context.clone(),
        }
    }

    /// Run the packaging command in the project root
    pub async fn invoke_pack(&mut self) -> PackResult<()> {
        self.expect_stage(BuildStage::ToolchainReady)?;
        let result = self.run_pack().await;
        self.advance(result, BuildStage::Packed)
    }

    async fn run_pack(&self) -> PackResult<()> {
        if let Some(cache) = &self.shared_cache {
            fs::create_dir_all(&cache.dir).await.map_err(|e| {
                PackError::io(format!("creating cache directory {}", cache.dir.display()), e)
            })?;
        }

        let invocation = self.invocation();
        info!(
            "Building Charm in {}: {}",
            invocation.cwd.display(),
            invocation.display()
        );

        let code = self.runner.run(&invocation).await?;
        if code != 0 {
            return Err(PackError::BuildFailed {
                command: invocation.display(),
                code,
            });
        }
        Ok(())
    }

    /// Locate the packed Charm in the project root
    pub async fn resolve_artifact(&mut self, io: &dyn PlatformIo) -> PackResult<PathBuf> {
        self.expect_stage(BuildStage::Packed)?;
        let root = &self.config.project_root;
        let result = self.resolver.resolve(root).await.map(|resolved| {
            if resolved.multiple_found() {
                io.warning(&format!("Multiple Charms found in {}", root.display()));
            }
            resolved.path
        });
        self.advance(result, BuildStage::ArtifactResolved)
    }

    /// The project root the build runs in
    pub fn project_root(&self) -> &Path {
        &self.config.project_root
    }

    fn expect_stage(&self, expected: BuildStage) -> PackResult<()> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(PackError::InvalidStage {
                expected: expected.as_str(),
                actual: self.stage.as_str(),
            })
        }
    }

    fn advance<T>(&mut self, result: PackResult<T>, next: BuildStage) -> PackResult<T> {
        match result {
            Ok(value) => {
                debug!("Build stage {} -> {}", self.stage, next);
                self.stage = next;
                Ok(value)
            }
            Err(e) => {
                debug!("Build failed in stage {}: {}", self.stage, e);
                self.stage = BuildStage::Failed;
                Err(e)
            }
        }
    }
}
