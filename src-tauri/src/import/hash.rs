// Phase 2: Hash. Computes the full BLAKE3 of every scanned item (and a
// perceptual hash for images) with bounded parallelism. A single file's
// failure is recorded on its own `HashResult` and never stops the phase,
// matching spec.md 4.E.

use std::sync::mpsc;

use crate::constants::DEFAULT_HASH_WORKERS;
use crate::hash::{compute_full_hash, compute_perceptual_hash};

use super::types::{HashPhaseResult, HashResult, ScanItem};

pub fn hash_items(items: &[ScanItem]) -> HashPhaseResult {
    let work: Vec<(usize, ScanItem)> = items.iter().cloned().enumerate().collect();
    let chunks = split_round_robin(work, DEFAULT_HASH_WORKERS.max(1));

    let (tx, rx) = mpsc::channel::<HashResult>();

    std::thread::scope(|scope| {
        for chunk in chunks {
            let tx = tx.clone();
            scope.spawn(move || {
                for (scan_index, item) in chunk {
                    let _ = tx.send(hash_one(scan_index, &item));
                }
            });
        }
        drop(tx);
    });

    let mut results: Vec<HashResult> = rx.iter().collect();
    results.sort_by_key(|r| r.scan_index);
    HashPhaseResult { results }
}

fn hash_one(scan_index: usize, item: &ScanItem) -> HashResult {
    let path = std::path::Path::new(&item.path);
    match compute_full_hash(path) {
        Ok(hash) => {
            let perceptual_hash = if item.detected_kind == "image" {
                compute_perceptual_hash(path).ok()
            } else {
                None
            };
            HashResult {
                scan_index,
                hash: Some(hash),
                perceptual_hash,
                error: None,
            }
        }
        Err(e) => HashResult {
            scan_index,
            hash: None,
            perceptual_hash: None,
            error: Some(e.to_string()),
        },
    }
}

fn split_round_robin<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    let mut chunks: Vec<Vec<T>> = (0..workers).map(|_| Vec::new()).collect();
    for (i, item) in items.into_iter().enumerate() {
        chunks[i % workers].push(item);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn hash_items_preserves_scan_index_order() {
        let dir = tempdir().unwrap();
        let mut items = Vec::new();
        for i in 0..6 {
            let path = dir.path().join(format!("f{}.txt", i));
            std::fs::write(&path, format!("content-{}", i)).unwrap();
            items.push(ScanItem {
                path: path.display().to_string(),
                bytes: 9,
                mtime: 0,
                extension: "txt".to_string(),
                detected_kind: "document".to_string(),
                hidden: false,
                hidden_reason: None,
                over_ceiling: false,
            });
        }

        let result = hash_items(&items);
        let indices: Vec<usize> = result.results.iter().map(|r| r.scan_index).collect();
        assert_eq!(indices, (0..6).collect::<Vec<_>>());
        assert!(result.results.iter().all(|r| r.hash.is_some()));
    }

    #[test]
    fn hash_items_records_error_for_missing_file() {
        let items = vec![ScanItem {
            path: "/nonexistent/path/does-not-exist.jpg".to_string(),
            bytes: 0,
            mtime: 0,
            extension: "jpg".to_string(),
            detected_kind: "image".to_string(),
            hidden: false,
            hidden_reason: None,
            over_ceiling: false,
        }];

        let result = hash_items(&items);
        assert_eq!(result.results.len(), 1);
        assert!(result.results[0].hash.is_none());
        assert!(result.results[0].error.is_some());
    }
}
