// Location merge engine: detects and executes catalog entries that
// describe the same physical place. Grounded on spec.md 4.H.

pub mod decide;
pub mod engine;
pub mod similarity;

pub use decide::{decide, MergeCandidate, MergeDecision};
pub use engine::{execute_merge, find_merge_candidates, reject_merge, MergeSuggestion};
