//! Snapshot file I/O for the store.
//!
//! Snapshots are a single JSON object mapping each key to `{"Value": "..."}`.
//! Writes go to a temp file next to the target, are synced, then renamed over
//! the previous snapshot.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use super::StoreItem;
use crate::error::StoreError;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Serialize committed entries with keys in sorted order.
pub(crate) fn encode(items: &HashMap<String, StoreItem>) -> Result<Vec<u8>, StoreError> {
    let ordered: BTreeMap<&String, &StoreItem> = items.iter().collect();
    Ok(serde_json::to_vec(&ordered)?)
}

/// Read a snapshot. A missing or empty file yields an empty map.
pub(crate) fn read(path: &Path) -> Result<HashMap<String, StoreItem>, StoreError> {
    let contents = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No snapshot at {}, starting empty", path.display());
            return Ok(HashMap::new());
        }
        Err(e) => return Err(io_error(path, e)),
    };

    if contents.iter().all(u8::is_ascii_whitespace) {
        return Ok(HashMap::new());
    }

    Ok(serde_json::from_slice(&contents)?)
}

/// Replace the snapshot at `path` with `bytes`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
    }

    let temp_path = temp_path_for(path);
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| io_error(&temp_path, e))?;

        file.write_all(bytes).map_err(|e| io_error(&temp_path, e))?;
        file.sync_all().map_err(|e| io_error(&temp_path, e))?;
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(io_error(path, e));
    }

    debug!("Wrote snapshot {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.{}.tmp", process::id(), seq));
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn item(value: &str) -> StoreItem {
        StoreItem {
            value: value.to_string(),
        }
    }

    #[test]
    fn test_encode_uses_value_field_sorted() {
        let mut items = HashMap::new();
        items.insert("b".to_string(), item("2"));
        items.insert("a".to_string(), item("1"));

        let encoded = encode(&items).unwrap();
        assert_eq!(
            std::str::from_utf8(&encoded).unwrap(),
            r#"{"a":{"Value":"1"},"b":{"Value":"2"}}"#
        );
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let items = read(&dir.path().join("absent.json")).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_read_empty_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.json");
        fs::write(&path, b"").unwrap();
        assert!(read(&path).unwrap().is_empty());
    }

    #[test]
    fn test_read_corrupt_file_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, b"[1, 2").unwrap();
        assert!(matches!(read(&path), Err(StoreError::Snapshot(_))));
    }

    #[test]
    fn test_write_creates_parent_and_leaves_no_temp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("memdb.json");

        write_atomic(&path, br#"{"k":{"Value":"v"}}"#).unwrap();
        write_atomic(&path, br#"{"k":{"Value":"w"}}"#).unwrap();

        let items = read(&path).unwrap();
        assert_eq!(items.get("k").map(|i| i.value.as_str()), Some("w"));

        let entries: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
