//! Cache store: load, store, and delete per-unit records.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process;

use serde::Serialize;
use thiserror::Error;

use super::fingerprint;
use super::lock::{LockError, UnitLock};
use super::record::{CacheRecord, RecordError};
use crate::config::CacheConfig;
use crate::unit::TemplateUnit;

/// Extension of the combined record file.
pub const RECORD_EXT: &str = "tplc";
/// Extension of the human-readable generated-source copy.
pub const SOURCE_EXT: &str = "src";

/// Cache result type
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors from cache operations.
///
/// Only genuine failures surface here. Absent, unreadable, stale, and
/// structurally invalid records are all reported as a plain miss from
/// `load`, never as an error.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("record error: {0}")]
    Record(#[from] RecordError),

    #[error("unit `{0}` has no compiled binary to cache")]
    MissingBinary(String),
}

/// Aggregate statistics over the cache directory.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Number of record files.
    pub count: usize,
    /// Total size of all record files in bytes.
    pub total_size_bytes: u64,
}

/// On-disk artifact cache.
///
/// Maps each unit's stable name to one record file in the configured
/// cache directory. All configuration is carried by the [`CacheConfig`]
/// value passed at construction.
pub struct ArtifactCache {
    config: CacheConfig,
}

impl ArtifactCache {
    /// Create a cache over the configured directory.
    ///
    /// The directory is created lazily on the first write.
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Restore a unit's artifacts from its cached record.
    ///
    /// Returns `Ok(true)` on a hit: the unit's generated source (when the
    /// record has one) and compiled binary are filled in and compilation
    /// can be skipped. Returns `Ok(false)` on any miss: caching disabled,
    /// no record, record unreadable for permission reasons, record
    /// structurally invalid, or fingerprint mismatch (stale). Stale and
    /// invalid records are left in place for the next `store` to
    /// overwrite.
    ///
    /// Any other I/O failure is fatal and propagates.
    pub fn load(&self, unit: &mut TemplateUnit) -> CacheResult<bool> {
        if !self.config.enabled {
            return Ok(false);
        }

        let path = self.record_path(unit);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
                ) =>
            {
                return Ok(false);
            }
            Err(e) => return Err(CacheError::Io(e)),
        };

        let record = match CacheRecord::decode(&bytes) {
            Ok(record) => record,
            // Partial or corrupt record: miss, never a crash or a bogus hit.
            Err(_) => return Ok(false),
        };

        let current = self.fingerprint(unit);
        if record.fingerprint != current {
            return Ok(false);
        }

        if !record.generated_source.is_empty() {
            unit.set_generated_source(record.generated_source);
        } // else the unit is a sub-part with no generated source of its own

        unit.set_compiled_binary(record.compiled_binary);
        Ok(true)
    }

    /// Write (or overwrite) the unit's record.
    ///
    /// The record is assembled in memory, written to a temp file in the
    /// cache directory, and renamed into place, so a concurrent `load`
    /// sees either the old record or the new one, never a partial write.
    /// Writers for the same unit are serialized by the unit's lock.
    pub fn store(&self, unit: &TemplateUnit) -> CacheResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let binary = unit
            .compiled_binary()
            .ok_or_else(|| CacheError::MissingBinary(unit.name().to_string()))?;

        let record = CacheRecord {
            fingerprint: self.fingerprint(unit),
            generated_source: unit.generated_source().unwrap_or_default().to_string(),
            compiled_binary: binary.to_vec(),
        };
        let bytes = record.encode()?;

        let stem = unit.file_stem();
        let _lock = UnitLock::acquire(&self.config.cache_dir, &stem, self.config.lock_timeout())?;

        let path = self.record_path(unit);
        let tmp_path = self
            .config
            .cache_dir
            .join(format!(".{stem}.tmp.{}", process::id()));

        fs::write(&tmp_path, &bytes)?;
        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(CacheError::Io(e));
        }

        Ok(())
    }

    /// Write the unit's generated source to a sibling `.src` file.
    ///
    /// Purely for human inspection; `load` never reads it. No-op when the
    /// unit has no generated source.
    pub fn store_generated_source(&self, unit: &TemplateUnit) -> CacheResult<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let Some(source) = unit.generated_source() else {
            return Ok(());
        };

        fs::create_dir_all(&self.config.cache_dir)?;
        fs::write(self.source_path(unit), source.as_bytes())?;
        Ok(())
    }

    /// Remove the unit's record, if any.
    ///
    /// Absence is not an error. The `.src` copy is left behind.
    pub fn delete(&self, unit: &TemplateUnit) -> CacheResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let stem = unit.file_stem();
        let _lock = UnitLock::acquire(&self.config.cache_dir, &stem, self.config.lock_timeout())?;

        match fs::remove_file(self.record_path(unit)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    /// List all record files currently in the cache directory.
    pub fn list_records(&self) -> CacheResult<Vec<PathBuf>> {
        if !self.config.cache_dir.exists() {
            return Ok(Vec::new());
        }

        let mut records: Vec<PathBuf> = fs::read_dir(&self.config.cache_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|ext| ext == RECORD_EXT).unwrap_or(false))
            .collect();
        records.sort();

        Ok(records)
    }

    /// Record count and total size of the cache directory.
    pub fn stats(&self) -> CacheResult<CacheStats> {
        let records = self.list_records()?;
        let mut total_size_bytes = 0u64;
        for record in &records {
            total_size_bytes += fs::metadata(record)?.len();
        }

        Ok(CacheStats {
            count: records.len(),
            total_size_bytes,
        })
    }

    /// Current fingerprint for a unit under this configuration.
    fn fingerprint(&self, unit: &TemplateUnit) -> String {
        fingerprint::compute(
            unit.raw_source(),
            &self.config.engine_version,
            &self.config.transform_identities,
        )
    }

    /// Path of the unit's record file: `<cache_dir>/<stem>.tplc`.
    pub fn record_path(&self, unit: &TemplateUnit) -> PathBuf {
        self.config
            .cache_dir
            .join(format!("{}.{RECORD_EXT}", unit.file_stem()))
    }

    /// Path of the unit's generated-source copy: `<cache_dir>/<stem>.src`.
    pub fn source_path(&self, unit: &TemplateUnit) -> PathBuf {
        self.config
            .cache_dir
            .join(format!("{}.{SOURCE_EXT}", unit.file_stem()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_test_config(temp_dir: &TempDir) -> CacheConfig {
        CacheConfig {
            cache_dir: temp_dir.path().join("cache"),
            engine_version: "1.0.0".to_string(),
            transform_identities: vec!["minify".to_string()],
            ..CacheConfig::default()
        }
    }

    fn compiled_unit(name: &str, raw: &str) -> TemplateUnit {
        TemplateUnit::new(name, raw)
            .with_generated_source(format!("fn render_{name}() {{}}"))
            .with_compiled_binary(vec![0xde, 0xad, 0xbe, 0xef])
    }

    #[test]
    fn test_load_miss_without_store() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(make_test_config(&temp_dir));

        let mut unit = TemplateUnit::new("index", "@title@");
        assert!(!cache.load(&mut unit).unwrap());
        assert!(unit.compiled_binary().is_none());
    }

    #[test]
    fn test_store_then_load_hits() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(make_test_config(&temp_dir));

        let compiled = compiled_unit("index", "@title@");
        cache.store(&compiled).unwrap();

        let mut fresh = TemplateUnit::new("index", "@title@");
        assert!(cache.load(&mut fresh).unwrap());
        assert_eq!(fresh.generated_source(), compiled.generated_source());
        assert_eq!(fresh.compiled_binary(), compiled.compiled_binary());
    }

    #[test]
    fn test_store_requires_compiled_binary() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(make_test_config(&temp_dir));

        let unit = TemplateUnit::new("index", "@title@");
        let err = cache.store(&unit).unwrap_err();
        assert!(matches!(err, CacheError::MissingBinary(name) if name == "index"));
    }

    #[test]
    fn test_changed_source_misses() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(make_test_config(&temp_dir));

        cache.store(&compiled_unit("index", "@title@")).unwrap();

        let mut edited = TemplateUnit::new("index", "@title@ edited");
        assert!(!cache.load(&mut edited).unwrap());
        // Stale record stays on disk for the next store to overwrite.
        assert!(cache.record_path(&edited).exists());
    }

    #[test]
    fn test_changed_engine_version_misses() {
        let temp_dir = TempDir::new().unwrap();
        let config = make_test_config(&temp_dir);
        ArtifactCache::new(config.clone())
            .store(&compiled_unit("index", "@title@"))
            .unwrap();

        let mut bumped = config;
        bumped.engine_version = "2.0.0".to_string();
        let cache = ArtifactCache::new(bumped);

        let mut unit = TemplateUnit::new("index", "@title@");
        assert!(!cache.load(&mut unit).unwrap());
    }

    #[test]
    fn test_changed_transforms_miss() {
        let temp_dir = TempDir::new().unwrap();
        let config = make_test_config(&temp_dir);
        ArtifactCache::new(config.clone())
            .store(&compiled_unit("index", "@title@"))
            .unwrap();

        let mut changed = config;
        changed.transform_identities.push("banner".to_string());
        let cache = ArtifactCache::new(changed);

        let mut unit = TemplateUnit::new("index", "@title@");
        assert!(!cache.load(&mut unit).unwrap());
    }

    #[test]
    fn test_store_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(make_test_config(&temp_dir));

        let compiled = compiled_unit("index", "@title@");
        cache.store(&compiled).unwrap();
        cache.store(&compiled).unwrap();

        let mut fresh = TemplateUnit::new("index", "@title@");
        assert!(cache.load(&mut fresh).unwrap());
        assert_eq!(fresh.compiled_binary(), compiled.compiled_binary());
        assert_eq!(cache.stats().unwrap().count, 1);
    }

    #[test]
    fn test_store_overwrites_stale_record() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(make_test_config(&temp_dir));

        cache.store(&compiled_unit("index", "@title@")).unwrap();

        let recompiled = TemplateUnit::new("index", "@title@ v2")
            .with_generated_source("fn render_v2() {}")
            .with_compiled_binary(vec![9, 9, 9]);
        cache.store(&recompiled).unwrap();

        let mut fresh = TemplateUnit::new("index", "@title@ v2");
        assert!(cache.load(&mut fresh).unwrap());
        assert_eq!(fresh.generated_source(), Some("fn render_v2() {}"));
        assert_eq!(fresh.compiled_binary(), Some(&[9u8, 9, 9][..]));
    }

    #[test]
    fn test_sub_part_unit_keeps_no_generated_source() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(make_test_config(&temp_dir));

        // A sub-part has a binary but no generated source of its own.
        let sub_part = TemplateUnit::new("index.inner", "@inner@").with_compiled_binary(vec![1]);
        cache.store(&sub_part).unwrap();

        let mut fresh = TemplateUnit::new("index.inner", "@inner@");
        assert!(cache.load(&mut fresh).unwrap());
        assert!(fresh.generated_source().is_none());
        assert_eq!(fresh.compiled_binary(), Some(&[1u8][..]));
    }

    #[test]
    fn test_delete_then_miss() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(make_test_config(&temp_dir));

        let compiled = compiled_unit("index", "@title@");
        cache.store(&compiled).unwrap();
        cache.delete(&compiled).unwrap();

        let mut fresh = TemplateUnit::new("index", "@title@");
        assert!(!cache.load(&mut fresh).unwrap());
    }

    #[test]
    fn test_delete_absent_record_is_ok() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(make_test_config(&temp_dir));

        cache.delete(&TemplateUnit::new("never-stored", "src")).unwrap();
    }

    #[test]
    fn test_corrupt_record_is_a_miss() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(make_test_config(&temp_dir));

        let compiled = compiled_unit("index", "@title@");
        cache.store(&compiled).unwrap();

        // Truncate the record mid-payload.
        let path = cache.record_path(&compiled);
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        let mut fresh = TemplateUnit::new("index", "@title@");
        assert!(!cache.load(&mut fresh).unwrap());
        assert!(fresh.compiled_binary().is_none());
        // The corrupt record is left in place, not repaired or deleted.
        assert!(path.exists());
    }

    #[test]
    fn test_disabled_cache_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = make_test_config(&temp_dir);
        config.enabled = false;
        let cache = ArtifactCache::new(config.clone());

        let compiled = compiled_unit("index", "@title@");
        cache.store(&compiled).unwrap();
        cache.store_generated_source(&compiled).unwrap();
        assert!(!config.cache_dir.exists(), "disabled store must not create files");

        let mut fresh = TemplateUnit::new("index", "@title@");
        assert!(!cache.load(&mut fresh).unwrap());
        cache.delete(&compiled).unwrap();
    }

    #[test]
    fn test_store_generated_source_writes_mirror() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(make_test_config(&temp_dir));

        let compiled = compiled_unit("index", "@title@");
        cache.store_generated_source(&compiled).unwrap();

        let mirror = fs::read_to_string(cache.source_path(&compiled)).unwrap();
        assert_eq!(mirror, compiled.generated_source().unwrap());
    }

    #[test]
    fn test_store_generated_source_noop_for_sub_part() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(make_test_config(&temp_dir));

        let sub_part = TemplateUnit::new("inner", "@x@").with_compiled_binary(vec![1]);
        cache.store_generated_source(&sub_part).unwrap();

        assert!(!cache.source_path(&sub_part).exists());
    }

    #[test]
    fn test_unit_names_map_to_distinct_records() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(make_test_config(&temp_dir));

        cache.store(&compiled_unit("index", "a")).unwrap();
        cache.store(&compiled_unit("layout", "b")).unwrap();

        let records = cache.list_records().unwrap();
        assert_eq!(records.len(), 2);

        let mut index = TemplateUnit::new("index", "a");
        let mut layout = TemplateUnit::new("layout", "b");
        assert!(cache.load(&mut index).unwrap());
        assert!(cache.load(&mut layout).unwrap());
        assert_ne!(index.generated_source(), layout.generated_source());
    }

    #[test]
    fn test_stats() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(make_test_config(&temp_dir));

        assert_eq!(cache.stats().unwrap().count, 0);

        cache.store(&compiled_unit("index", "a")).unwrap();
        cache.store(&compiled_unit("layout", "b")).unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.count, 2);
        assert!(stats.total_size_bytes > 0);
    }

    #[test]
    fn test_list_records_ignores_lock_and_src_files() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(make_test_config(&temp_dir));

        let compiled = compiled_unit("index", "a");
        cache.store(&compiled).unwrap();
        cache.store_generated_source(&compiled).unwrap();

        let records = cache.list_records().unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].ends_with("index.tplc"));
    }
}
