//! Persistent translation cache
//!
//! One JSON document per (target language, source file), stored under
//! `<cache_dir>/<target_language>/<file_id>.json`:
//!
//! ```json
//! {
//!     "version": 1,
//!     "file": "base.txt",
//!     "target_language": "it",
//!     "entries": {
//!         "电力": { "key": "电力", "source_fingerprint": "…", "status": "OK", … }
//!     }
//! }
//! ```
//!
//! Saves are atomic: the new document is written to a temporary file in the
//! same directory and renamed over the old one.

use crate::error::{Error, Result};
use crate::record::CacheRecord;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

const CACHE_FORMAT_VERSION: u32 = 1;

/// In-memory cache mapping for a single source file
///
/// Owned by whoever is processing that file; never shared between files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileCache {
    file_id: String,
    entries: BTreeMap<String, CacheRecord>,
}

impl FileCache {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn get(&self, key: &str) -> Option<&CacheRecord> {
        self.entries.get(key)
    }

    /// Upsert: any existing record for `key` is replaced whole
    pub fn put(&mut self, key: impl Into<String>, record: CacheRecord) {
        self.entries.insert(key.into(), record);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CacheRecord)> {
        self.entries.iter()
    }
}

#[derive(Serialize)]
struct CacheDocument<'a> {
    version: u32,
    file: &'a str,
    target_language: &'a str,
    entries: &'a BTreeMap<String, CacheRecord>,
}

#[derive(Deserialize)]
struct RawCacheDocument {
    #[serde(default)]
    version: u32,
    entries: serde_json::Map<String, Value>,
}

/// Directory-backed store of [`FileCache`]s for one target language
#[derive(Debug)]
pub struct CacheStore {
    root: PathBuf,
    target_language: String,
    io_guard: Mutex<()>,
}

impl CacheStore {
    /// Open (or create) the store for `target_language` under `cache_dir`
    ///
    /// Failing to create the directory is a configuration error: nothing
    /// could ever be persisted.
    pub fn open(cache_dir: &Path, target_language: &str) -> Result<Self> {
        let root = cache_dir.join(target_language);
        fs::create_dir_all(&root).map_err(|e| {
            Error::Config(format!(
                "Cache directory '{}' is not writable: {}",
                root.display(),
                e
            ))
        })?;

        debug!(path = %root.display(), "cache store opened");

        Ok(Self {
            root,
            target_language: target_language.to_string(),
            io_guard: Mutex::new(()),
        })
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    /// Location of the persisted document for `file_id`
    pub fn path_for(&self, file_id: &str) -> PathBuf {
        let safe: String = file_id
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        self.root.join(format!("{}.json", safe))
    }

    /// Read the persisted mapping for `file_id`
    ///
    /// Returns an empty mapping if nothing has been persisted yet. Entries that
    /// fail to decode individually are skipped; only a document that cannot be
    /// parsed at all yields [`Error::CorruptCache`].
    pub fn load(&self, file_id: &str) -> Result<FileCache> {
        let path = self.path_for(file_id);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(FileCache::new(file_id));
            }
            Err(e) => return Err(Error::io(&path, e)),
        };

        let raw: RawCacheDocument =
            serde_json::from_slice(&content).map_err(|source| Error::CorruptCache {
                path: path.clone(),
                source,
            })?;

        if raw.version > CACHE_FORMAT_VERSION {
            warn!(
                file = file_id,
                version = raw.version,
                "cache document written by a newer version, reading what is understood"
            );
        }

        let mut cache = FileCache::new(file_id);
        let mut skipped = 0usize;
        for (key, value) in raw.entries {
            match serde_json::from_value::<CacheRecord>(value) {
                Ok(record) if record.key == key => cache.put(key, record),
                Ok(record) => {
                    warn!(file = file_id, key = %key, record_key = %record.key, "cache entry key mismatch, skipping");
                    skipped += 1;
                }
                Err(e) => {
                    warn!(file = file_id, key = %key, error = %e, "corrupt cache entry, skipping");
                    skipped += 1;
                }
            }
        }

        debug!(file = file_id, entries = cache.len(), skipped, "cache loaded");
        Ok(cache)
    }

    /// Load, treating an unreadable document as empty
    ///
    /// The corrupt document is moved aside to `<name>.json.corrupt` so that the
    /// next [`save`](Self::save) cannot destroy whatever it still contains.
    pub fn load_or_recover(&self, file_id: &str) -> Result<FileCache> {
        match self.load(file_id) {
            Err(Error::CorruptCache { path, source }) => {
                let quarantine = path.with_extension("json.corrupt");
                fs::rename(&path, &quarantine).map_err(|e| Error::io(&path, e))?;
                warn!(
                    file = file_id,
                    error = %source,
                    moved_to = %quarantine.display(),
                    "cache unreadable, starting empty"
                );
                Ok(FileCache::new(file_id))
            }
            other => other,
        }
    }

    /// Atomically persist `cache`
    pub fn save(&self, cache: &FileCache) -> Result<()> {
        let path = self.path_for(cache.file_id());
        let document = CacheDocument {
            version: CACHE_FORMAT_VERSION,
            file: cache.file_id(),
            target_language: &self.target_language,
            entries: &cache.entries,
        };
        let bytes = serde_json::to_vec_pretty(&document)
            .map_err(|e| Error::Resource(format!("Failed to serialize cache: {}", e)))?;

        let _guard = self.io_guard.lock();

        let mut tmp = NamedTempFile::new_in(&self.root).map_err(|e| Error::io(&self.root, e))?;
        tmp.write_all(&bytes)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| Error::io(tmp.path(), e))?;
        tmp.persist(&path).map_err(|e| Error::io(&path, e.error))?;

        info!(file = cache.file_id(), entries = cache.len(), "cache saved");
        Ok(())
    }
}
