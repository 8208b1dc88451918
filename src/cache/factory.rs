//! Cache store factory
//!
//! Picks the Actions cache service when the runner exposes it and falls
//! back to the on-disk store otherwise.

use crate::cache::actions::{ActionsCacheStore, ServiceEndpoint};
use crate::cache::store::{CacheStore, LocalCacheStore};
use crate::config::schema::{CacheBackend, CacheConfig};
use crate::error::{PackError, PackResult};
use tracing::debug;

/// Create the cache store for `config`
///
/// # Arguments
/// * `config` - Cache configuration
/// * `endpoint` - Cache service endpoint, if the runner exposes one
pub fn create_store(
    config: &CacheConfig,
    endpoint: Option<ServiceEndpoint>,
) -> PackResult<Box<dyn CacheStore>> {
    let store: Box<dyn CacheStore> = match (config.backend, endpoint) {
        (CacheBackend::Local, _) | (CacheBackend::Auto, None) => Box::new(
            LocalCacheStore::new(config.store_dir.clone())
                .with_retention(config.restore_key.clone(), config.keep_entries as usize),
        ),
        (CacheBackend::Auto | CacheBackend::Actions, Some(endpoint)) => {
            Box::new(ActionsCacheStore::new(endpoint))
        }
        (CacheBackend::Actions, None) => {
            let [token, url] = ServiceEndpoint::required_vars();
            return Err(PackError::CacheStore(format!(
                "Actions cache service unavailable: {} and {} must be set",
                token, url
            )));
        }
    };

    debug!("Using {} cache store", store.store_name());
    Ok(store)
}
