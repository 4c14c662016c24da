//! Snapshot Cache
//!
//! Persists the raw payload of every successful fetch and keeps the latest
//! parsed resources per kind in memory.
//!
//! Layout under the cache root:
//! - `<key>_<timestamp>.json` - archival copy, one per store, never rewritten
//! - `<key>_latest.json` - newest payload for the kind, always overwritten

use super::model::Resource;
use super::parser::{parse_json, repair_json};
use super::registry::ResourceKind;
use crate::error::{IngestError, IngestResult};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Resources per kind, iterated in registry order
pub type ResourceMap = BTreeMap<ResourceKind, Vec<Resource>>;

/// Archive timestamp, UTC, millisecond resolution
const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%3f";

/// Upper bound on suffixes tried when an archive name is already taken
const MAX_ARCHIVE_ATTEMPTS: u32 = 1000;

pub struct SnapshotCache {
    root: PathBuf,
    live: ResourceMap,
}

impl SnapshotCache {
    /// Open a cache rooted at `root`, creating the directory if needed.
    /// A directory that cannot be created only disables persistence.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        if let Err(e) = fs::create_dir_all(&root) {
            tracing::warn!("Failed to create cache directory {:?}: {}", root, e);
        }

        Self {
            root,
            live: ResourceKind::ALL.iter().map(|k| (*k, Vec::new())).collect(),
        }
    }

    /// Default cache location
    pub fn default_root() -> PathBuf {
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("ovnscope");
        }
        if let Some(home) = dirs::home_dir() {
            return home.join(".ovnscope").join("cache");
        }
        PathBuf::from(".ovnscope-cache")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the always-overwritten snapshot for `kind`
    pub fn latest_path(&self, kind: ResourceKind) -> PathBuf {
        self.root.join(format!("{}_latest.json", kind.key()))
    }

    /// Persist a raw payload for `kind`. Failures are logged, never raised.
    pub fn store_snapshot(&self, kind: ResourceKind, raw: &str) {
        if let Err(e) = self.try_store_snapshot(kind, raw) {
            tracing::error!("Failed to cache {} data: {}", kind, e);
        }
    }

    /// Persist a raw payload, returning the archival path written
    pub fn try_store_snapshot(&self, kind: ResourceKind, raw: &str) -> IngestResult<PathBuf> {
        let payload = repair_json(raw);

        let archive = self.write_archive(kind, payload.as_bytes())?;
        tracing::info!("Cached {} data to {:?}", kind, archive);

        let latest = self.latest_path(kind);
        fs::write(&latest, payload.as_bytes())
            .map_err(|source| IngestError::CacheWrite { path: latest, source })?;

        Ok(archive)
    }

    fn write_archive(&self, kind: ResourceKind, payload: &[u8]) -> IngestResult<PathBuf> {
        let stamp = Utc::now().format(ARCHIVE_TIMESTAMP_FORMAT).to_string();

        for attempt in 0..MAX_ARCHIVE_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{}_{}.json", kind.key(), stamp)
            } else {
                format!("{}_{}-{}.json", kind.key(), stamp, attempt)
            };
            let path = self.root.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(payload)
                        .map_err(|source| IngestError::CacheWrite { path: path.clone(), source })?;
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(IngestError::CacheWrite { path, source }),
            }
        }

        Err(IngestError::CacheWrite {
            path: self.root.join(format!("{}_{}.json", kind.key(), stamp)),
            source: std::io::Error::new(ErrorKind::AlreadyExists, "no free archive name"),
        })
    }

    /// Load the latest snapshot for `kind`. Cold start yields nothing.
    pub fn load_snapshot(&self, kind: ResourceKind) -> Vec<Resource> {
        let path = self.latest_path(kind);
        if !path.exists() {
            tracing::info!("No cached data for {}", kind);
            return Vec::new();
        }

        match fs::read_to_string(&path) {
            Ok(content) => {
                let resources = parse_json(kind, &content);
                tracing::info!("Loaded {} {} resources from cache", resources.len(), kind);
                resources
            }
            Err(source) => {
                tracing::error!("{}", IngestError::CacheRead { path, source });
                Vec::new()
            }
        }
    }

    /// Load the latest snapshot of every registered kind
    pub fn load_all(&self) -> ResourceMap {
        ResourceKind::ALL
            .iter()
            .map(|kind| (*kind, self.load_snapshot(*kind)))
            .collect()
    }

    /// Seed the live mapping from disk
    pub fn warm(&mut self) {
        for (kind, resources) in self.load_all() {
            self.update_live(kind, resources);
        }
    }

    /// Replace the live resources of `kind`
    pub fn update_live(&mut self, kind: ResourceKind, resources: Vec<Resource>) {
        self.live.insert(kind, resources);
    }

    pub fn live(&self, kind: ResourceKind) -> &[Resource] {
        self.live.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn live_all(&self) -> &ResourceMap {
        &self.live
    }

    /// Archival snapshots for `kind`, oldest first
    pub fn archives(&self, kind: ResourceKind) -> Vec<PathBuf> {
        let prefix = format!("{}_", kind.key());
        let latest = self.latest_path(kind);

        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| *path != latest)
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| is_archive_name(n, &prefix))
            })
            .collect();
        paths.sort();
        paths
    }

    /// Age of the latest snapshot, if there is one
    pub fn snapshot_age(&self, kind: ResourceKind) -> Option<Duration> {
        let modified = fs::metadata(self.latest_path(kind)).ok()?.modified().ok()?;
        SystemTime::now().duration_since(modified).ok()
    }
}

/// `<prefix><digits>[-n].json`. Keys like `logical_router` are a prefix of
/// `logical_router_port`, so the stamp must start with a digit.
fn is_archive_name(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(".json"))
        .is_some_and(|stamp| stamp.starts_with(|c: char| c.is_ascii_digit()))
}
