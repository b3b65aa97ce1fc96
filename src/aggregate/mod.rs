//! Aggregation: builds the per-PR worklist, the bucketed actionable
//! summary, and the periodic lookout digest from entry sequences, per §4.7.

pub mod actionable;
pub mod lookout;
pub mod worklist;

pub use actionable::{ActionableBucket, ActionableSummary, Perspective, actionable_summary};
pub use lookout::{LookoutAttention, LookoutSummary, lookout};
pub use worklist::{EntryCounts, ReviewStateCounts, WorklistItem, worklist};
