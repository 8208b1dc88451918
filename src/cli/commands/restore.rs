//! Restore command - warm the package cache before the build step

use crate::cli::args::RestoreArgs;
use crate::cli::commands::cache_plan;
use crate::config::Config;
use crate::error::PackResult;
use crate::platform::PlatformIo;

/// Execute the restore command
///
/// Never fails because of the cache itself: a miss or a missing run
/// identity is reported and the step succeeds.
pub async fn execute(args: RestoreArgs, config: &Config, io: &dyn PlatformIo) -> PackResult<()> {
    if !args.cache.caching_enabled() {
        io.info("Charmcraft package caching disabled");
        return Ok(());
    }

    io.info("Restoring charmcraft package cache");
    match cache_plan(&args.cache, config) {
        Ok(plan) => {
            plan.restore(io).await;
        }
        Err(e) => io.warning(&format!("Charmcraft package caching unavailable: {}", e)),
    }
    Ok(())
}
