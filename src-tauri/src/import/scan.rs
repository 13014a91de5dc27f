// Phase 1: Scan. Walks the discovered files and emits one `ScanItem` per
// file, flagging (but not excluding) hidden files, metadata sidecars, and
// oversized files per spec.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::constants::{IMPORT_SIZE_CEILING_BYTES, SIDECAR_EXTENSIONS};

use super::types::{ScanItem, ScanPhaseResult};

pub fn scan(files: &[PathBuf]) -> ScanPhaseResult {
    let mut items = Vec::with_capacity(files.len());
    let mut total_bytes = 0u64;

    for path in files {
        if let Some(item) = scan_one(path) {
            total_bytes += item.bytes;
            items.push(item);
        }
    }

    let total_count = items.len();
    ScanPhaseResult {
        items,
        total_count,
        total_bytes,
    }
}

fn scan_one(path: &Path) -> Option<ScanItem> {
    let meta = std::fs::metadata(path).ok()?;
    let bytes = meta.len();
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let is_hidden_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false);
    let is_sidecar = SIDECAR_EXTENSIONS.contains(&extension.as_str());

    let (hidden, hidden_reason) = if is_sidecar {
        (true, Some("metadata_sidecar".to_string()))
    } else if is_hidden_name {
        (true, Some("hidden_file".to_string()))
    } else {
        (false, None)
    };

    Some(ScanItem {
        path: path.display().to_string(),
        bytes,
        mtime,
        extension: extension.clone(),
        detected_kind: crate::metadata::detect_media_type(path),
        hidden,
        hidden_reason,
        over_ceiling: bytes > IMPORT_SIZE_CEILING_BYTES,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn scan_flags_sidecar_files() {
        let dir = tempdir().unwrap();
        let sidecar = dir.path().join("clip.srt");
        std::fs::write(&sidecar, b"1\n").unwrap();

        let result = scan(&[sidecar]);
        assert_eq!(result.items.len(), 1);
        assert!(result.items[0].hidden);
        assert_eq!(result.items[0].hidden_reason.as_deref(), Some("metadata_sidecar"));
    }

    #[test]
    fn scan_counts_total_bytes() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        std::fs::write(&a, b"hello").unwrap();
        std::fs::write(&b, b"world!").unwrap();

        let result = scan(&[a, b]);
        assert_eq!(result.total_count, 2);
        assert_eq!(result.total_bytes, 11);
    }

    #[test]
    fn scan_skips_files_that_vanish_before_stat() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("gone.jpg");
        let result = scan(&[missing]);
        assert!(result.items.is_empty());
    }
}
