//! Rule set snapshots
//!
//! Compiling a large filter list is the expensive step; a snapshot stores the
//! compiled `RuleSet` so later runs can load it directly. The snapshot is a
//! versioned JSON document and round-trips field-for-field, rule ids included.

mod format;
mod loader;

pub use format::*;
pub use loader::*;
