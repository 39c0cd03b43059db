//! Snapshot format v1
//!
//! ```text
//! {
//!   "format": "trackgate-rules",
//!   "version": 1,
//!   "rule_count": <number of rules in all partitions>,
//!   "rules": { "blocking": [...], "exceptions": [...],
//!              "element_hiding": [...], "element_hiding_exceptions": [...] }
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Format tag stored in every snapshot
pub const SNAPSHOT_FORMAT: &str = "trackgate-rules";

/// Current format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Top-level snapshot document. `R` is `&RuleSet` when saving and
/// `RuleSet` when loading.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<R> {
    pub format: String,
    pub version: u32,
    pub rule_count: usize,
    pub rules: R,
}
