use chrono::Utc;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::{Config, error::CacheError, model::CacheRecord};

/// Current time as fractional seconds since the Unix epoch.
pub fn now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Single-file store for the latest [`CacheRecord`].
///
/// Reads never fail: a missing, unreadable, corrupt or stale file is a miss.
/// Writes are best-effort and replace the file atomically.
///
/// A store without a path (no home directory could be found) behaves as a
/// permanent miss and discards writes.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: Option<PathBuf>,
    ttl_secs: u64,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>, ttl_secs: u64) -> Self {
        Self {
            path: Some(path.into()),
            ttl_secs,
        }
    }

    pub fn disabled() -> Self {
        Self {
            path: None,
            ttl_secs: 0,
        }
    }

    /// Store at the configured path, or a disabled one if it can't be resolved.
    pub fn from_config(config: &Config) -> Self {
        match config.cache_path() {
            Ok(path) => Self::new(path, config.cache_ttl_secs),
            Err(e) => {
                tracing::warn!(error = %e, "cache disabled");
                Self::disabled()
            }
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn load(&self) -> Option<CacheRecord> {
        self.load_at(now_secs())
    }

    /// Like [`CacheStore::load`] with an explicit clock.
    pub fn load_at(&self, now: f64) -> Option<CacheRecord> {
        match self.read_fresh(now) {
            Ok(record) => {
                tracing::debug!(city = %record.city, "using cached weather");
                Some(record)
            }
            Err(e) => {
                tracing::debug!(reason = %e, "cache miss");
                None
            }
        }
    }

    fn read_fresh(&self, now: f64) -> Result<CacheRecord, CacheError> {
        let record = self.read()?;
        if record.is_fresh(now, self.ttl_secs) {
            Ok(record)
        } else {
            Err(CacheError::Expired {
                age_secs: record.age_secs(now),
            })
        }
    }

    fn read(&self) -> Result<CacheRecord, CacheError> {
        let path = self.path.as_deref().ok_or(CacheError::Disabled)?;
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(CacheError::Missing),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&contents)?)
    }

    /// Persist `record`, logging instead of failing.
    pub fn save(&self, record: &CacheRecord) {
        match self.write(record) {
            Ok(()) => tracing::debug!(city = %record.city, "cached weather data"),
            Err(e) => tracing::warn!(error = %e, "failed to save cache"),
        }
    }

    fn write(&self, record: &CacheRecord) -> Result<(), CacheError> {
        let path = self.path.as_deref().ok_or(CacheError::Disabled)?;
        let parent = path.parent().ok_or(CacheError::NoParent)?;
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(record)?;

        let mut tmp_name = path
            .file_name()
            .ok_or(CacheError::NoParent)?
            .to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        fs::write(&tmp_path, json)?;
        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> CacheStore {
        CacheStore::new(dir.path().join("cache.json"), 1800)
    }

    #[test]
    fn missing_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store_in(&dir).load().is_none());
    }

    #[test]
    fn saved_record_loads_while_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let record = CacheRecord::new(10_000.0, "Denver", "48F, Clear");

        store.save(&record);

        assert_eq!(store.load_at(10_000.0 + 60.0), Some(record));
        assert!(!dir.path().join("cache.json.tmp").exists());
    }

    #[test]
    fn expired_record_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&CacheRecord::new(10_000.0, "Denver", "48F, Clear"));

        assert!(store.load_at(10_000.0 + 1800.0).is_none());
    }

    #[test]
    fn corrupt_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let path = store.path().unwrap();
        fs::write(path, "{not json").unwrap();
        assert!(store.load().is_none());

        fs::write(path, r#"{"timestamp": "yesterday", "city": 3}"#).unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn save_overwrites_whole_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let now = now_secs();

        store.save(&CacheRecord::new(now, "Denver", "48F, Clear"));
        store.save(&CacheRecord::new(now, "Boise", "40F, Snow"));

        let loaded = store.load().expect("fresh record");
        assert_eq!(loaded.city, "Boise");
        assert_eq!(loaded.weather_text, "40F, Snow");
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("nested/deeper/cache.json"), 1800);

        store.save(&CacheRecord::new(now_secs(), "Reno", "70F, Clear"));
        assert!(store.load().is_some());
    }

    #[test]
    fn disabled_store_misses_and_drops_writes() {
        let store = CacheStore::disabled();
        assert!(store.path().is_none());

        store.save(&CacheRecord::new(now_secs(), "Reno", "70F, Clear"));
        assert!(store.load().is_none());
    }

    #[test]
    fn from_config_uses_configured_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            cache_file: Some(dir.path().join("c.json")),
            ..Config::default()
        };
        let store = CacheStore::from_config(&config);
        assert_eq!(store.path(), Some(dir.path().join("c.json").as_path()));
    }

    #[test]
    fn unwritable_location_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();

        // parent is a regular file, so the write must fail quietly
        let store = CacheStore::new(blocker.join("cache.json"), 1800);
        store.save(&CacheRecord::new(now_secs(), "Reno", "70F, Clear"));
        assert!(store.load().is_none());
    }
}
