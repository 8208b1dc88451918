//! CLI command implementations

pub mod pack;
pub mod restore;

pub use pack::execute as pack;
pub use restore::execute as restore;

use crate::build::CachePlan;
use crate::cache::{create_store, CacheKey, PackageCache, ServiceEndpoint};
use crate::cli::args::CacheArgs;
use crate::config::Config;
use crate::error::PackResult;
use tracing::debug;

/// Build the cache plan for this run from the configured store and run identity
pub(crate) fn cache_plan(args: &CacheArgs, config: &Config) -> PackResult<CachePlan> {
    let run = args.run_identity()?;
    let key = CacheKey::derive(&config.cache.restore_key, &run);
    debug!(
        "Cache keys: primary {}, restore {:?}",
        key.primary_key, key.restore_keys
    );

    let store = create_store(&config.cache, ServiceEndpoint::from_env())?;
    Ok(CachePlan {
        cache: PackageCache::new(store),
        key,
        dir: config.cache.dir.clone(),
    })
}
