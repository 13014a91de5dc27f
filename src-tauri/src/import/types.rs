// Per-phase result shapes for the import pipeline. Every phase's result is
// serialized straight into an `import_sessions` JSON column so a crash
// between phases loses nothing: `last_completed_step` plus these blobs are
// sufficient to resume.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanItem {
    pub path: String,
    pub bytes: u64,
    pub mtime: i64,
    pub extension: String,
    pub detected_kind: String,
    pub hidden: bool,
    pub hidden_reason: Option<String>,
    pub over_ceiling: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanPhaseResult {
    pub items: Vec<ScanItem>,
    pub total_count: usize,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashResult {
    pub scan_index: usize,
    pub hash: Option<String>,
    pub perceptual_hash: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HashPhaseResult {
    pub results: Vec<HashResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyResult {
    pub scan_index: usize,
    pub hash: Option<String>,
    pub archive_path: Option<String>,
    /// One of `copied`, `duplicate`, `error`.
    pub status: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CopyPhaseResult {
    pub results: Vec<CopyResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidatePhaseResult {
    pub valid_count: usize,
    /// Archive paths that failed rehash and were deleted to avoid orphans.
    pub corrupted: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportResult {
    pub total: usize,
    pub copied: usize,
    pub duplicate: usize,
    pub errored: usize,
    pub warnings: Vec<String>,
}
