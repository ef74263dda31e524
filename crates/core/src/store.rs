//! Durable key/value state that survives restarts.
//!
//! The file is a flat JSON object. Lookups are served from memory while
//! the file's modification stamp is unchanged. A token cleared through
//! another handle changes the stamp and is gone on the next lookup.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use parking_lot::Mutex;
use tracing::warn;

use crate::error::StoreError;

/// Key holding the bearer token.
pub const TOKEN_KEY: &str = "token";

type Entries = BTreeMap<String, String>;

/// Modification time and length of the file; `None` when it does not exist.
type Stamp = Option<(SystemTime, u64)>;

#[derive(Debug, Default)]
struct Cache {
    snapshot: Option<(Stamp, Entries)>,
    disk_reads: usize,
}

/// Shared handle to the persisted session file.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: Arc<PathBuf>,
    cache: Arc<Mutex<Cache>>,
}

impl TokenStore {
    /// Open (without creating) the state file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            cache: Arc::new(Mutex::new(Cache::default())),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a single key.
    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut cache = self.cache.lock();
        Ok(self.load(&mut cache)?.remove(key))
    }

    /// Write a single key, creating the file when needed.
    pub fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut cache = self.cache.lock();
        let mut entries = self.load_for_write(&mut cache)?;
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(&mut cache, entries)
    }

    /// Remove a key; removing an absent key is not an error.
    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut cache = self.cache.lock();
        let mut entries = self.load_for_write(&mut cache)?;
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.write_entries(&mut cache, entries)
    }

    /// Current bearer token. Unreadable state is logged and treated as absent.
    pub fn token(&self) -> Option<String> {
        match self.get(TOKEN_KEY) {
            Ok(token) => token.filter(|value| !value.is_empty()),
            Err(err) => {
                warn!("ignoring unreadable session state: {err}");
                None
            }
        }
    }

    /// Persist a new bearer token.
    pub fn set_token(&self, token: &str) -> Result<(), StoreError> {
        self.set(TOKEN_KEY, token)
    }

    /// Forget the bearer token.
    pub fn clear_token(&self) -> Result<(), StoreError> {
        self.remove(TOKEN_KEY)
    }

    fn load(&self, cache: &mut Cache) -> Result<Entries, StoreError> {
        let stamp = self.stamp()?;
        if let Some((cached, entries)) = &cache.snapshot {
            if *cached == stamp {
                return Ok(entries.clone());
            }
        }
        let entries = match stamp {
            Some(_) => {
                cache.disk_reads += 1;
                self.read_file()?
            }
            None => Entries::new(),
        };
        cache.snapshot = Some((stamp, entries.clone()));
        Ok(entries)
    }

    fn load_for_write(&self, cache: &mut Cache) -> Result<Entries, StoreError> {
        match self.load(cache) {
            Err(StoreError::Corrupt { path, source }) => {
                warn!("discarding corrupt state file {path}: {source}");
                Ok(Entries::new())
            }
            other => other,
        }
    }

    fn stamp(&self) -> Result<Stamp, StoreError> {
        match fs::metadata(self.path.as_ref()) {
            Ok(meta) => {
                let modified = meta.modified().map_err(|source| self.io_error(source))?;
                Ok(Some((modified, meta.len())))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn read_file(&self) -> Result<Entries, StoreError> {
        let contents = match fs::read_to_string(self.path.as_ref()) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(source) => return Err(self.io_error(source)),
        };
        if contents.trim().is_empty() {
            return Ok(Entries::new());
        }
        serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })
    }

    fn write_entries(&self, cache: &mut Cache, entries: Entries) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let serialized = serde_json::to_string_pretty(&entries).map_err(|source| {
            StoreError::Corrupt {
                path: self.path.display().to_string(),
                source,
            }
        })?;
        fs::write(self.path.as_ref(), serialized).map_err(|source| self.io_error(source))?;
        cache.snapshot = Some((self.stamp()?, entries));
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}
