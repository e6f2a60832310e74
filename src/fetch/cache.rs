//! Response cache keyed by request signature.
//!
//! The signature is the site path plus normalized query parameters and never
//! includes the mirror that served the page, so a response fetched through one
//! proxy satisfies the same request sent to any other.
//!
//! Normalization rules:
//! - the path always starts with `/` and is otherwise kept verbatim
//! - query keys are trimmed and lowercased, values are kept verbatim
//! - pairs are sorted by key then value and percent-encoded

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

use super::transport::RawResponse;
use crate::error::{Error, Result};

/// Temp files older than this belong to a run that never finished its rename
const ABANDONED_TEMP_AGE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(path: &str, params: &[(&str, &str)]) -> Self {
        let mut signature = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        let mut pairs: Vec<(String, &str)> = params
            .iter()
            .map(|(key, value)| (key.trim().to_lowercase(), *value))
            .collect();
        pairs.sort();

        if !pairs.is_empty() {
            let query = pairs
                .iter()
                .map(|(key, value)| {
                    format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
                })
                .collect::<Vec<_>>()
                .join("&");
            signature.push('?');
            signature.push_str(&query);
        }

        Self(signature)
    }

    /// Path and query to append to a mirror's base URL
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn file_name(&self) -> String {
        format!("{:x}.json", Sha256::digest(self.0.as_bytes()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub status: u16,
    pub body: String,
    pub stored_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.stored_at);
        let ttl = i64::try_from(self.ttl_secs).unwrap_or(i64::MAX);
        age >= chrono::Duration::zero() && age.num_seconds() < ttl
    }
}

pub struct ResponseCache {
    dir: Option<PathBuf>,
    ttl: Duration,
    memory: Mutex<HashMap<CacheKey, CacheEntry>>,
    pruned: AtomicBool,
}

impl ResponseCache {
    /// Cache persisted as one JSON file per entry under `dir`
    pub fn on_disk(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: Some(dir.into()),
            ttl,
            memory: Mutex::new(HashMap::new()),
            pruned: AtomicBool::new(false),
        }
    }

    /// Cache that lives only as long as the process
    pub fn in_memory(ttl: Duration) -> Self {
        Self {
            dir: None,
            ttl,
            memory: Mutex::new(HashMap::new()),
            pruned: AtomicBool::new(false),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entry for `key`, if any. Expired or unreadable entries are misses.
    pub fn get_fresh(&self, key: &CacheKey) -> Option<CacheEntry> {
        let now = Utc::now();
        let mut memory = self.memory.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(entry) = memory.get(key) {
            if entry.is_fresh(now) {
                return Some(entry.clone());
            }
            memory.remove(key);
        }

        let entry = self.read_disk(key)?;
        if !entry.is_fresh(now) {
            debug!("Cache entry for {} expired", key.as_str());
            return None;
        }
        memory.insert(key.clone(), entry.clone());
        Some(entry)
    }

    /// Store a response, replacing any previous entry for the same key.
    pub fn store(&self, key: &CacheKey, response: &RawResponse) -> Result<CacheEntry> {
        let entry = CacheEntry {
            key: key.as_str().to_string(),
            status: response.status,
            body: response.body.clone(),
            stored_at: Utc::now(),
            ttl_secs: self.ttl.as_secs(),
        };

        self.memory
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.clone(), entry.clone());

        if let Some(dir) = &self.dir {
            write_entry(dir, &key.file_name(), &entry)?;

            // Once per process is enough to keep the directory bounded
            if !self.pruned.swap(true, Ordering::Relaxed) {
                match self.prune() {
                    Ok(0) => {}
                    Ok(removed) => debug!("Pruned {} stale cache file(s)", removed),
                    Err(e) => debug!("Cache pruning failed: {}", e),
                }
            }
        }

        Ok(entry)
    }

    /// Remove every stored entry, returning how many files were deleted
    pub fn clear(&self) -> Result<usize> {
        self.memory.lock().unwrap_or_else(|e| e.into_inner()).clear();

        match &self.dir {
            Some(dir) => remove_files(dir, |path| {
                matches!(extension(path), Some("json") | Some("tmp"))
            }),
            None => Ok(0),
        }
    }

    /// Delete expired or unreadable entries and abandoned temp files.
    pub fn prune(&self) -> Result<usize> {
        let Some(dir) = &self.dir else {
            return Ok(0);
        };
        let now = Utc::now();

        remove_files(dir, |path| match extension(path) {
            Some("json") => fs::read_to_string(path)
                .ok()
                .and_then(|content| serde_json::from_str::<CacheEntry>(&content).ok())
                .is_none_or(|entry| !entry.is_fresh(now)),
            Some("tmp") => fs::metadata(path)
                .and_then(|meta| meta.modified())
                .ok()
                .and_then(|modified| modified.elapsed().ok())
                .is_some_and(|age| age > ABANDONED_TEMP_AGE),
            _ => false,
        })
    }

    fn read_disk(&self, key: &CacheKey) -> Option<CacheEntry> {
        let path = self.dir.as_ref()?.join(key.file_name());
        let content = fs::read_to_string(&path).ok()?;

        match serde_json::from_str::<CacheEntry>(&content) {
            // Hash collisions are not worth a second lookup, just miss
            Ok(entry) if entry.key == key.as_str() => Some(entry),
            Ok(_) => None,
            Err(e) => {
                debug!("Ignoring unreadable cache file {:?}: {}", path, e);
                None
            }
        }
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

fn remove_files(dir: &Path, doomed: impl Fn(&Path) -> bool) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    let entries = fs::read_dir(dir).map_err(|e| Error::filesystem(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| Error::filesystem(dir, e))?.path();
        if doomed(&path) {
            fs::remove_file(&path).map_err(|e| Error::filesystem(&path, e))?;
            removed += 1;
        }
    }
    Ok(removed)
}

// Whole-file replace so concurrent runs never observe a half-written entry
fn write_entry(dir: &Path, file_name: &str, entry: &CacheEntry) -> Result<()> {
    fs::create_dir_all(dir)
        .map_err(|e| Error::Cache(format!("failed to create {:?}: {}", dir, e)))?;

    let content = serde_json::to_string(entry)
        .map_err(|e| Error::Cache(format!("failed to serialize entry: {}", e)))?;

    let final_path = dir.join(file_name);
    let temp_path = dir.join(format!("{}.{}.tmp", file_name, std::process::id()));

    fs::write(&temp_path, content)
        .map_err(|e| Error::Cache(format!("failed to write {:?}: {}", temp_path, e)))?;
    fs::rename(&temp_path, &final_path)
        .map_err(|e| Error::Cache(format!("failed to replace {:?}: {}", final_path, e)))?;

    Ok(())
}
