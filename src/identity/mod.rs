//! Deterministic short-ID hashing and XDG-style path resolution.
//!
//! The only layer with no dependency on the rest of the crate — every other
//! module imports from here.

pub mod paths;
pub mod short_id;

pub use short_id::{ClassifiedId, ShortIdCache, ShortIdTarget, classify_id, format_display_id,
    generate_short_id, parse_display_id};
