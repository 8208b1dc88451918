//! Pack command - build a Charm and report it

use crate::build::{pipeline, ArtifactResolver, BuildConfiguration, Builder, SharedCache};
use crate::cli::args::PackArgs;
use crate::cli::commands::cache_plan;
use crate::config::Config;
use crate::error::PackResult;
use crate::orchestration::{ExecContext, ProcessRunner, SnapProvisioner};
use crate::platform::PlatformIo;
use std::sync::Arc;
use tracing::debug;

/// Execute the pack command
pub async fn execute(args: PackArgs, config: &Config, io: &dyn PlatformIo) -> PackResult<()> {
    let build_config = BuildConfiguration::new(
        &args.path,
        &args.channel,
        &args.revision,
        &args.verbosity,
        args.cache.caching_enabled(),
    )?;

    io.info(&format!("Building Charm in \"{}\"...", args.path));
    if !build_config.is_pinned() {
        io.warning(&format!(
            "Charmcraft revision not provided. Installing from {}",
            build_config.tool_channel
        ));
    }

    let toolchain = &config.toolchain;
    let provisioner = SnapProvisioner::new(&toolchain.snap, &toolchain.command, &toolchain.group);
    let caching_enabled = build_config.caching_enabled;

    let mut builder = Builder::new(
        build_config,
        Arc::new(provisioner),
        Arc::new(ProcessRunner::new()),
    )
    .with_command(&toolchain.command)
    .with_exec_context(ExecContext::from_group(&toolchain.group))
    .with_resolver(ArtifactResolver::new(
        &config.build.artifact_extension,
        config.build.sort_artifacts,
    ));

    let plan = if caching_enabled {
        match cache_plan(&args.cache, config) {
            Ok(plan) => {
                builder = builder.with_shared_cache(SharedCache {
                    env_var: config.cache.env_var.clone(),
                    dir: plan.dir.clone(),
                });
                Some(plan)
            }
            Err(e) => {
                io.warning(&format!("Charmcraft package caching unavailable: {}", e));
                None
            }
        }
    } else {
        io.info("Charmcraft package caching disabled");
        None
    };

    let charm = pipeline::run(&mut builder, plan.as_ref(), io).await?;
    debug!("Packed Charm: {}", charm.display());

    io.set_output("charm", &charm.display().to_string())
}
