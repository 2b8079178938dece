use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::PersistenceError;
use crate::models::FeedEvent;

/// Serialized feed history
pub const EVENTS_FILE: &str = "events.json";

/// Raw conditional-fetch token (Last-Modified value)
pub const TOKEN_FILE: &str = "modified.txt";

type Result<T> = std::result::Result<T, PersistenceError>;

/// Flat-file store for the feed history and its conditional-fetch token.
///
/// Both files live directly in the cache directory and are replaced through a
/// temp file + rename so a reader never sees a half-written file.
#[derive(Debug, Clone)]
pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .map_err(|e| PersistenceError::io(&cache_dir, e))?;
        Ok(Self { cache_dir })
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(name)
    }

    fn read_if_exists(&self, path: &Path) -> Result<Option<String>> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::io(path, e)),
        }
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, contents).map_err(|e| PersistenceError::io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| PersistenceError::io(path, e))?;
        Ok(())
    }

    fn load_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.cache_path(name);
        let Some(contents) = self.read_if_exists(&path)? else {
            return Ok(None);
        };
        let parsed = serde_json::from_str(&contents)
            .map_err(|source| PersistenceError::Parse { path, source })?;
        Ok(Some(parsed))
    }

    fn save_json<T: Serialize + ?Sized>(&self, name: &str, data: &T) -> Result<()> {
        let contents = serde_json::to_vec_pretty(data)?;
        self.write_atomic(&self.cache_path(name), &contents)
    }

    // ===== Feed history =====

    pub fn load_feed_events(&self) -> Result<Option<Vec<FeedEvent>>> {
        let events: Option<Vec<FeedEvent>> = self.load_json(EVENTS_FILE)?;
        if let Some(ref events) = events {
            debug!(count = events.len(), "Loaded cached feed events");
        }
        Ok(events)
    }

    pub fn save_feed_events(&self, events: &[FeedEvent]) -> Result<()> {
        self.save_json(EVENTS_FILE, events)
    }

    // ===== Conditional fetch token =====

    pub fn load_fetch_token(&self) -> Result<Option<String>> {
        let token = self.read_if_exists(&self.cache_path(TOKEN_FILE))?;
        Ok(token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }

    pub fn save_fetch_token(&self, token: &str) -> Result<()> {
        self.write_atomic(&self.cache_path(TOKEN_FILE), token.as_bytes())
    }
}

// ============================================================================
// Tests
// ============================================================================
