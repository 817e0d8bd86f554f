//! Write-once result cache for (e, m) tables.
use super::error::StoreError;
use crate::model::{GeoType, IndicatorRecord, Vintage};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Identifies one computed (e, m) table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub period: String,
    pub source: String,
    pub vintage: Vintage,
    pub geotype: GeoType,
    pub variable: String,
}

impl CacheKey {
    /// `{period}/{source}/{vintage}/{geotype}/{variable}.json`
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.period)
            .join(&self.source)
            .join(self.vintage.label())
            .join(self.geotype.label())
            .join(format!("{}.json", self.variable))
    }
}

/// Entries are immutable once written; a second write for the same key is
/// ignored.
pub trait ResultStore: Send + Sync {
    fn read(&self, key: &CacheKey) -> Result<Option<Vec<IndicatorRecord>>, StoreError>;

    /// Returns `false` when an entry already existed.
    fn write_if_absent(&self, key: &CacheKey, records: &[IndicatorRecord]) -> Result<bool, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<CacheKey, Arc<Vec<IndicatorRecord>>>>,
}

impl MemoryStore {
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultStore for MemoryStore {
    fn read(&self, key: &CacheKey) -> Result<Option<Vec<IndicatorRecord>>, StoreError> {
        let entries = self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(entries.get(key).map(|records| records.as_ref().clone()))
    }

    fn write_if_absent(&self, key: &CacheKey, records: &[IndicatorRecord]) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.clone(), Arc::new(records.to_vec()));
        Ok(true)
    }
}

static NEXT_TEMP: AtomicU64 = AtomicU64::new(0);

/// JSON files under a root directory, one per key.
///
/// Writes go to a temporary file that is hard-linked into place, so a
/// reader never sees a partial entry and an existing entry is never
/// replaced.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_of(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.relative_path())
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io { path: path.to_path_buf(), source }
}

impl ResultStore for FileStore {
    fn read(&self, key: &CacheKey) -> Result<Option<Vec<IndicatorRecord>>, StoreError> {
        let path = self.path_of(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path)(e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Serde { path: path.clone(), source })
    }

    fn write_if_absent(&self, key: &CacheKey, records: &[IndicatorRecord]) -> Result<bool, StoreError> {
        let path = self.path_of(key);
        if path.exists() {
            return Ok(false);
        }
        let dir = path.parent().unwrap_or(&self.root).to_path_buf();
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;

        let bytes = serde_json::to_vec(records).map_err(|source| StoreError::Serde { path: path.clone(), source })?;
        let temp = dir.join(format!(
            ".{}.{}.{}.tmp",
            key.variable,
            std::process::id(),
            NEXT_TEMP.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&temp, &bytes).map_err(io_error(&temp))?;

        let linked = match fs::hard_link(&temp, &path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(io_error(&path)(e)),
        };
        let _ = fs::remove_file(&temp);
        linked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(variable: &str) -> CacheKey {
        CacheKey {
            period: "2019".into(),
            source: "acs".into(),
            vintage: Vintage::Boundaries2010,
            geotype: GeoType::Nta,
            variable: variable.into(),
        }
    }

    fn records(e: f64) -> Vec<IndicatorRecord> {
        vec![IndicatorRecord::new("MN01", "pop", GeoType::Nta, Some(e), None)]
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(key("pop").relative_path(), PathBuf::from("2019/acs/2010/NTA/pop.json"));
    }

    #[test]
    fn test_memory_store_is_write_once() {
        let store = MemoryStore::default();
        assert_eq!(store.read(&key("pop")).unwrap(), None);
        assert!(store.write_if_absent(&key("pop"), &records(1.0)).unwrap());
        assert!(!store.write_if_absent(&key("pop"), &records(2.0)).unwrap());
        assert_eq!(store.read(&key("pop")).unwrap(), Some(records(1.0)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_memory_store_survives_a_poisoned_lock() {
        let store = Arc::new(MemoryStore::default());
        store.write_if_absent(&key("pop"), &records(1.0)).unwrap();
        let poisoner = Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.entries.write().unwrap();
            panic!("worker died holding the lock");
        })
        .join();
        assert!(store.entries.is_poisoned());
        assert_eq!(store.len(), 1);
        assert_eq!(store.read(&key("pop")).unwrap(), Some(records(1.0)));
    }

    #[test]
    fn test_file_store_round_trip_and_no_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let values = vec![IndicatorRecord::new("MN01", "pop", GeoType::Nta, Some(0.1 + 0.2), Some(1.0 / 3.0))];
        assert!(store.write_if_absent(&key("pop"), &values).unwrap());
        assert!(!store.write_if_absent(&key("pop"), &records(9.0)).unwrap());
        assert_eq!(store.read(&key("pop")).unwrap(), Some(values));
        assert!(dir.path().join("2019/acs/2010/NTA/pop.json").exists());
        assert_eq!(store.read(&key("missing")).unwrap(), None);

        let leftovers = fs::read_dir(dir.path().join("2019/acs/2010/NTA")).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_corrupt_entry_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let path = store.path_of(&key("pop"));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"not json").unwrap();
        assert!(matches!(store.read(&key("pop")), Err(StoreError::Serde { .. })));
    }
}
