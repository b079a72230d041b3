//! On-disk snapshot of the cache so short-lived processes refresh
//! incrementally instead of rebuilding from scratch.
//!
//! The snapshot is a JSON document next to an advisory lock file. It is
//! written to a temporary sibling and renamed into place. A snapshot that is
//! unreadable, from another format version, or for another namespace is
//! ignored, and the next refresh becomes a full rebuild.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{CacheState, Watermark};
use crate::lock::{SnapshotReadLock, SnapshotWriteLock};
use crate::model::{Namespace, RawRecord};

/// Bumped whenever the on-disk layout changes.
pub const SNAPSHOT_VERSION: u32 = 1;

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    namespace: Namespace,
    watermark: Option<Watermark>,
    entries: BTreeMap<u32, RawRecord>,
}

fn lock_path(path: &Path) -> PathBuf {
    path.with_extension("lock")
}

fn temp_path(path: &Path) -> PathBuf {
    path.with_extension("json.tmp")
}

/// Write `state` for `namespace` to `path`.
///
/// # Errors
///
/// Returns an error if the lock cannot be taken or the file cannot be written.
pub fn save(path: &Path, namespace: &Namespace, state: &CacheState) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create snapshot dir {}", parent.display()))?;
    }

    let _lock = SnapshotWriteLock::acquire(&lock_path(path), LOCK_TIMEOUT)
        .with_context(|| format!("lock snapshot {}", path.display()))?;

    let file = SnapshotFile {
        version: SNAPSHOT_VERSION,
        namespace: namespace.clone(),
        watermark: state.watermark(),
        entries: state.entries().clone(),
    };
    let bytes = serde_json::to_vec(&file).context("encode cache snapshot")?;

    let tmp = temp_path(path);
    fs::write(&tmp, &bytes).with_context(|| format!("write snapshot {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("move snapshot into place at {}", path.display()))?;

    tracing::debug!(
        path = %path.display(),
        entries = file.entries.len(),
        bytes = bytes.len(),
        "cache snapshot saved"
    );
    Ok(())
}

/// Load the snapshot at `path` if it exists and matches `namespace`.
///
/// # Errors
///
/// Returns an error only if the lock cannot be taken or the file exists but
/// cannot be read. Decode failures and mismatches yield `Ok(None)`.
pub fn load(path: &Path, namespace: &Namespace) -> Result<Option<CacheState>> {
    if !path.exists() {
        return Ok(None);
    }

    let _lock = SnapshotReadLock::acquire(&lock_path(path), LOCK_TIMEOUT)
        .with_context(|| format!("lock snapshot {}", path.display()))?;
    let bytes = fs::read(path).with_context(|| format!("read snapshot {}", path.display()))?;

    let file: SnapshotFile = match serde_json::from_slice(&bytes) {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!(path = %path.display(), "cache snapshot unreadable, ignoring: {e}");
            return Ok(None);
        }
    };

    if file.version != SNAPSHOT_VERSION {
        tracing::warn!(
            found = file.version,
            expected = SNAPSHOT_VERSION,
            "cache snapshot version mismatch, ignoring"
        );
        return Ok(None);
    }
    if &file.namespace != namespace {
        tracing::warn!(
            found = %file.namespace,
            expected = %namespace,
            "cache snapshot is for another namespace, ignoring"
        );
        return Ok(None);
    }

    tracing::debug!(entries = file.entries.len(), "cache snapshot loaded");
    Ok(Some(CacheState::new(file.entries, file.watermark)))
}

/// Delete the snapshot at `path`, if any.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be removed.
pub fn remove(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("remove snapshot {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawValue;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn sample_state() -> CacheState {
        let mut record = RawRecord::new();
        record.insert("Name".into(), RawValue::from("Kamera Sony"));
        record.insert(
            "Typ_devicetypes".into(),
            RawValue::List(vec!["Kamera".into(), "Stativ".into()]),
        );
        let mut entries = BTreeMap::new();
        entries.insert(42, record);
        let watermark = Watermark::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().expect("valid"));
        CacheState::new(entries, Some(watermark))
    }

    #[test]
    fn save_then_load_restores_state() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("cache/snapshot.json");
        let ns = Namespace::new("lab:ausstattung:");
        let state = sample_state();

        save(&path, &ns, &state).expect("save");
        let loaded = load(&path, &ns).expect("load").expect("present");
        assert_eq!(loaded, state);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn missing_snapshot_is_none() {
        let tmp = TempDir::new().expect("tempdir");
        let loaded = load(&tmp.path().join("nope.json"), &Namespace::new("a:")).expect("load");
        assert!(loaded.is_none());
    }

    #[test]
    fn other_namespace_is_ignored() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("snapshot.json");
        save(&path, &Namespace::new("lab:ausstattung:"), &sample_state()).expect("save");
        let loaded = load(&path, &Namespace::new("lab:archiv:")).expect("load");
        assert!(loaded.is_none());
    }

    #[test]
    fn corrupt_snapshot_is_ignored() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("snapshot.json");
        fs::write(&path, b"{ not json").expect("write");
        let loaded = load(&path, &Namespace::new("lab:ausstattung:")).expect("load");
        assert!(loaded.is_none());
    }

    #[test]
    fn remove_is_idempotent() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("snapshot.json");
        save(&path, &Namespace::new("x:"), &sample_state()).expect("save");
        remove(&path).expect("remove");
        assert!(!path.exists());
        remove(&path).expect("second remove");
    }
}
