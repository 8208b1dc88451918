//! Keyed package cache
//!
//! charmcraft keeps downloaded packages in a shared cache directory. This
//! module restores that directory before a build and saves it afterwards.
//!
//! # Keys
//!
//! | Key | Example | Lookup |
//! |-----|---------|--------|
//! | primary | `craft-shared-cache-1234-1-pack` | exact |
//! | restore | `craft-shared-cache` | prefix, newest entry wins |
//!
//! Every attempt saves under its own primary key, so concurrent attempts
//! never overwrite each other; the shared prefix lets any attempt warm up
//! from the newest saved cache.
//!
//! # Stores
//!
//! On GitHub-hosted runners entries live in the Actions cache service
//! (`ActionsCacheStore`). Elsewhere they are kept on disk
//! (`LocalCacheStore`), pruned to the newest few per restore key.

pub mod actions;
pub mod factory;
pub mod key;
pub mod package;
pub mod store;

pub use actions::{ActionsCacheStore, ServiceEndpoint};
pub use factory::create_store;
pub use key::{CacheKey, RunIdentity};
pub use package::PackageCache;
pub use store::{CacheStore, EntryMetadata, LocalCacheStore};
