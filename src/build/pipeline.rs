//! End-to-end pack pipeline
//!
//! restore cache -> provision -> pack -> save cache -> resolve artifact.
//! The cache is only saved after a successful pack.

use crate::build::orchestrator::Builder;
use crate::cache::{CacheKey, PackageCache};
use crate::error::PackResult;
use crate::platform::PlatformIo;
use std::path::PathBuf;

/// Package cache participation for one run
pub struct CachePlan {
    pub cache: PackageCache,
    pub key: CacheKey,
    /// Local directory restored into and saved from
    pub dir: PathBuf,
}

impl CachePlan {
    /// Restore the cache directory; a miss is not an error
    pub async fn restore(&self, io: &dyn PlatformIo) -> Option<String> {
        self.cache.restore(&self.dir, &self.key, io).await
    }

    /// Save the cache directory under the primary key
    pub async fn save(&self, io: &dyn PlatformIo) -> Option<String> {
        self.cache.save(&self.dir, &self.key.primary_key, io).await
    }
}

/// Run a full build and return the artifact path
pub async fn run(
    builder: &mut Builder,
    cache: Option<&CachePlan>,
    io: &dyn PlatformIo,
) -> PackResult<PathBuf> {
    if let Some(plan) = cache {
        plan.restore(io).await;
    }

    builder.provision_toolchain(io).await?;
    builder.invoke_pack().await?;

    if let Some(plan) = cache {
        plan.save(io).await;
    }

    builder.resolve_artifact(io).await
}
