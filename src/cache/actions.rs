//! Cache store backed by the GitHub Actions cache service
//!
//! Entries are gzipped tarballs holding one `<index>/` tree per cached path.
//! Lookups, reservations and commits go through the service's twirp API;
//! the archive itself moves through the signed blob URLs it hands out.

use crate::cache::store::{copy_tree, CacheStore};
use crate::error::{PackError, PackResult};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const TOKEN_VAR: &str = "ACTIONS_RUNTIME_TOKEN";
const RESULTS_URL_VAR: &str = "ACTIONS_RESULTS_URL";
const SERVICE_PATH: &str = "twirp/github.actions.results.api.v1.CacheService";
const COMPRESSION: &str = "gzip";
const VERSION_SALT: &str = "1.0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Where the runner exposes the cache service, and the token to call it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub base_url: String,
    pub token: String,
}

impl ServiceEndpoint {
    /// Read the endpoint from the runner environment
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the endpoint through `lookup`. Both variables must be non-empty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let token = lookup(TOKEN_VAR).filter(|v| !v.is_empty())?;
        let base_url = lookup(RESULTS_URL_VAR).filter(|v| !v.is_empty())?;
        Some(Self { base_url, token })
    }

    /// Names of the variables `from_env` needs
    pub fn required_vars() -> [&'static str; 2] {
        [TOKEN_VAR, RESULTS_URL_VAR]
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            SERVICE_PATH,
            method
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DownloadUrlRequest<'a> {
    key: &'a str,
    restore_keys: &'a [String],
    version: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DownloadUrlResponse {
    ok: bool,
    signed_download_url: String,
    matched_key: String,
}

#[derive(Serialize)]
struct CreateEntryRequest<'a> {
    key: &'a str,
    version: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CreateEntryResponse {
    ok: bool,
    signed_upload_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FinalizeRequest<'a> {
    key: &'a str,
    // int64 travels as a string in protobuf JSON
    size_bytes: String,
    version: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FinalizeResponse {
    ok: bool,
}

/// Cache store talking to the Actions cache service over HTTP
#[derive(Clone)]
pub struct ActionsCacheStore {
    endpoint: ServiceEndpoint,
    agent: ureq::Agent,
    scratch: PathBuf,
}

impl ActionsCacheStore {
    pub fn new(endpoint: ServiceEndpoint) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build();
        let scratch = std::env::var_os("RUNNER_TEMP")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);

        Self {
            endpoint,
            agent: ureq::Agent::new_with_config(config),
            scratch,
        }
    }

    fn scratch_archive(&self) -> PathBuf {
        self.scratch.join(format!("charmcraft-pack-{}.tgz", Uuid::new_v4()))
    }

    /// POST a twirp request and decode the reply.
    ///
    /// 404 and 409 decode as the default reply (`ok: false`): the service
    /// uses them for "no such entry" and "entry already exists".
    fn call<Req, Resp>(&self, method: &str, request: &Req) -> PackResult<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned + Default,
    {
        let body = serde_json::to_vec(request)?;
        debug!("Calling cache service {}", method);

        let mut response = self
            .agent
            .post(self.endpoint.method_url(method))
            .header("Authorization", format!("Bearer {}", self.endpoint.token))
            .header("Content-Type", "application/json")
            .header(
                "User-Agent",
                concat!("charmcraft-pack/", env!("CARGO_PKG_VERSION")),
            )
            .send(&body[..])
            .map_err(|e| PackError::cache_service(method, e))?;

        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| PackError::cache_service(method, e))?;

        match status {
            404 | 409 => Ok(Resp::default()),
            200..=299 => Ok(serde_json::from_str(&text)?),
            _ => Err(PackError::cache_service(method, format!("HTTP {}: {}", status, text.trim()))),
        }
    }

    fn download(&self, url: &str, dest: &Path) -> PackResult<()> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| PackError::cache_service("download", e))?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(PackError::cache_service("download", format!("HTTP {}", status)));
        }

        let mut reader = response.into_body().into_reader();
        let mut file = File::create(dest)
            .map_err(|e| PackError::io(format!("creating {}", dest.display()), e))?;
        std::io::copy(&mut reader, &mut file)
            .map_err(|e| PackError::io(format!("downloading to {}", dest.display()), e))?;
        Ok(())
    }

    fn upload(&self, url: &str, archive: &Path, size: u64) -> PackResult<()> {
        let file = File::open(archive)
            .map_err(|e| PackError::io(format!("opening {}", archive.display()), e))?;
        let response = self
            .agent
            .put(url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("Content-Length", size.to_string())
            .send(file)
            .map_err(|e| PackError::cache_service("upload", e))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(PackError::cache_service("upload", format!("HTTP {}", status)));
        }
        Ok(())
    }

    fn restore_blocking(
        &self,
        paths: &[PathBuf],
        primary_key: &str,
        restore_keys: &[String],
    ) -> PackResult<Option<String>> {
        let version = cache_version(paths);
        let request = DownloadUrlRequest {
            key: primary_key,
            restore_keys,
            version: &version,
        };
        let reply: DownloadUrlResponse = self.call("GetCacheEntryDownloadURL", &request)?;
        if !reply.ok || reply.signed_download_url.is_empty() {
            return Ok(None);
        }

        let archive = self.scratch_archive();
        let result = self
            .download(&reply.signed_download_url, &archive)
            .and_then(|()| extract_archive(&archive, paths));
        let _ = fs::remove_file(&archive);
        result?;

        if reply.matched_key.is_empty() {
            Ok(Some(primary_key.to_string()))
        } else {
            Ok(Some(reply.matched_key))
        }
    }

    fn save_blocking(&self, paths: &[PathBuf], key: &str) -> PackResult<Option<String>> {
        for path in paths {
            if fs::symlink_metadata(path).is_err() {
                return Err(PackError::CacheStore(format!(
                    "path to cache does not exist: {}",
                    path.display()
                )));
            }
        }

        let archive = self.scratch_archive();
        let result = self.upload_entry(paths, key, &archive);
        let _ = fs::remove_file(&archive);
        result
    }

    fn upload_entry(
        &self,
        paths: &[PathBuf],
        key: &str,
        archive: &Path,
    ) -> PackResult<Option<String>> {
        let version = cache_version(paths);
        let size = write_archive(paths, archive)?;
        debug!("Cache archive for {} is {} bytes", key, size);

        let request = CreateEntryRequest {
            key,
            version: &version,
        };
        let reply: CreateEntryResponse = self.call("CreateCacheEntry", &request)?;
        if !reply.ok || reply.signed_upload_url.is_empty() {
            debug!("Cache entry {} already exists", key);
            return Ok(None);
        }

        self.upload(&reply.signed_upload_url, archive, size)?;

        let request = FinalizeRequest {
            key,
            size_bytes: size.to_string(),
            version: &version,
        };
        let reply: FinalizeResponse = self.call("FinalizeCacheEntryUpload", &request)?;
        if !reply.ok {
            return Err(PackError::cache_service(
                "FinalizeCacheEntryUpload",
                format!("entry {} was not committed", key),
            ));
        }
        Ok(Some(key.to_string()))
    }
}

#[async_trait]
impl CacheStore for ActionsCacheStore {
    async fn restore(
        &self,
        paths: &[PathBuf],
        primary_key: &str,
        restore_keys: &[String],
    ) -> PackResult<Option<String>> {
        let store = self.clone();
        let paths = paths.to_vec();
        let primary_key = primary_key.to_string();
        let restore_keys = restore_keys.to_vec();

        tokio::task::spawn_blocking(move || {
            store.restore_blocking(&paths, &primary_key, &restore_keys)
        })
        .await
        .map_err(|e| PackError::Internal(format!("cache restore task failed: {}", e)))?
    }

    async fn save(&self, paths: &[PathBuf], key: &str) -> PackResult<Option<String>> {
        let store = self.clone();
        let paths = paths.to_vec();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || store.save_blocking(&paths, &key))
            .await
            .map_err(|e| PackError::Internal(format!("cache save task failed: {}", e)))?
    }

    fn store_name(&self) -> &'static str {
        "actions"
    }
}

/// Version tag scoping entries to the cached paths and archive format
fn cache_version(paths: &[PathBuf]) -> String {
    let mut components: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    components.push(COMPRESSION.to_string());
    components.push(VERSION_SALT.to_string());
    hex::encode(Sha256::digest(components.join("|").as_bytes()))
}

/// Write `paths` into a gzipped tarball as `0/`, `1/`, ... and return its size
fn write_archive(paths: &[PathBuf], archive: &Path) -> PackResult<u64> {
    let file = File::create(archive)
        .map_err(|e| PackError::io(format!("creating {}", archive.display()), e))?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);

    for (index, path) in paths.iter().enumerate() {
        let name = index.to_string();
        let metadata = fs::symlink_metadata(path)
            .map_err(|e| PackError::io(format!("reading {}", path.display()), e))?;
        let appended = if metadata.is_dir() {
            builder.append_dir_all(&name, path)
        } else {
            builder.append_path_with_name(path, &name)
        };
        appended.map_err(|e| PackError::io(format!("archiving {}", path.display()), e))?;
    }

    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(|e| PackError::io(format!("writing {}", archive.display()), e))?;

    fs::metadata(archive)
        .map(|m| m.len())
        .map_err(|e| PackError::io(format!("reading {}", archive.display()), e))
}

/// Unpack an archive written by `write_archive` onto `paths`
fn extract_archive(archive: &Path, paths: &[PathBuf]) -> PackResult<()> {
    let staging = archive.with_extension("extract");
    let file = File::open(archive)
        .map_err(|e| PackError::io(format!("opening {}", archive.display()), e))?;

    let result = tar::Archive::new(GzDecoder::new(file))
        .unpack(&staging)
        .map_err(|e| PackError::io(format!("extracting {}", archive.display()), e))
        .and_then(|()| {
            for (index, target) in paths.iter().enumerate() {
                let source = staging.join(index.to_string());
                if fs::symlink_metadata(&source).is_err() {
                    debug!("Archive has no data for {}", target.display());
                    continue;
                }
                copy_tree(&source, target)?;
            }
            Ok(())
        });

    let _ = fs::remove_dir_all(&staging);
    result
}
