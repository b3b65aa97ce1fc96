//! Deterministic short-ID hashing and classification.
//!
//! This module has no dependencies beyond the standard library, per the
//! identity/paths layer's "no dependencies" contract — the hash is a
//! hand-rolled FNV-1a variant rather than pulling in a hashing crate for five
//! hex characters.

use std::collections::HashMap;

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// Hash `(full_id, repo)` into a stable 64-bit digest.
///
/// The hash depends on both `full_id` and `repo` so the same comment id
/// across forks produces distinct short IDs.
fn fnv1a(full_id: &str, repo: &str) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in full_id.as_bytes().iter().chain(b"\0").chain(repo.as_bytes()) {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Generate a deterministic 5-hex-char short ID for `(full_id, repo)`.
///
/// Five hex chars (20 bits) is the shortest prefix that renders unambiguously
/// in tables while remaining typeable; collisions within a single repo's live
/// entries are expected at around 1e6 ids before a 50% collision probability
/// and are resolved by the cache (first-registered wins).
pub fn generate_short_id(full_id: &str, repo: &str) -> String {
    let hash = fnv1a(full_id, repo);
    format!("{:05x}", hash & 0xf_ffff)
}

/// The result of classifying a user-supplied identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedId {
    PrNumber(u64),
    ShortId(String),
    FullId(String),
    Unknown,
}

/// Classify a user-supplied identifier into one of the recognized shapes.
///
/// - `pr_number`: decimal digits only.
/// - `short_id`: matches `@?[a-f0-9]{4,5}` (case-insensitive), optionally
///   wrapped in `[...]`.
/// - `full_id`: long alphanumeric string with `_` (GitHub node id shape).
/// - else `unknown`.
pub fn classify_id(input: &str) -> ClassifiedId {
    let trimmed = input.trim();

    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = trimmed.parse::<u64>() {
            return ClassifiedId::PrNumber(n);
        }
    }

    let unwrapped = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed);
    let unwrapped = unwrapped.strip_prefix('@').unwrap_or(unwrapped);

    if is_short_id_shape(unwrapped) {
        return ClassifiedId::ShortId(unwrapped.to_lowercase());
    }

    if is_full_id_shape(trimmed) {
        return ClassifiedId::FullId(trimmed.to_owned());
    }

    ClassifiedId::Unknown
}

fn is_short_id_shape(s: &str) -> bool {
    (s.len() == 4 || s.len() == 5) && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_full_id_shape(s: &str) -> bool {
    // GitHub GraphQL node ids: long alphanumeric strings, may contain `_`.
    s.len() > 8 && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Format a short ID for display: `"[@xxxxx]"`, lowercase.
pub fn format_display_id(short_id: &str) -> String {
    format!("[@{}]", short_id.to_lowercase())
}

/// Parse a display-formatted ID (`"[@xxxxx]"`, `"@xxxxx"`, or bare `"xxxxx"`)
/// back into its bare lowercase short-ID form.
pub fn parse_display_id(display: &str) -> String {
    let unwrapped = display
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(display);
    unwrapped.strip_prefix('@').unwrap_or(unwrapped).to_lowercase()
}

/// An entry usable by the short-ID cache: anything that carries a full gh_id,
/// a repo slug, and a PR number.
#[derive(Debug, Clone)]
pub struct ShortIdTarget {
    pub full_id: String,
    pub repo: String,
    pub pr: u64,
}

/// Bi-map from 5-hex short ids to their full identity, built fresh from a
/// set of entries. Not persisted — rebuilt on demand from the store.
#[derive(Debug, Default, Clone)]
pub struct ShortIdCache {
    by_short: HashMap<String, ShortIdTarget>,
}

impl ShortIdCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from a sequence of targets, registering `(hash, entry)`
    /// in insertion order. On a real collision (the same short id already
    /// mapped to a different full id) the first-registered mapping wins and
    /// the later one is simply not registered — it remains an unresolved
    /// miss on lookup.
    pub fn build<I>(targets: I) -> Self
    where
        I: IntoIterator<Item = ShortIdTarget>,
    {
        let mut cache = Self::new();
        for target in targets {
            cache.register(target);
        }
        cache
    }

    /// Register one target, computing its short id. First-registered wins on
    /// collision.
    pub fn register(&mut self, target: ShortIdTarget) -> String {
        let short = generate_short_id(&target.full_id, &target.repo);
        self.by_short.entry(short.clone()).or_insert(target);
        short
    }

    /// Resolve a user-supplied identifier after normalizing brackets, `@`,
    /// and case.
    pub fn resolve(&self, input: &str) -> Option<&ShortIdTarget> {
        let normalized = parse_display_id(input);
        self.by_short.get(&normalized)
    }

    pub fn is_empty(&self) -> bool {
        self.by_short.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_short.len()
    }

    pub fn clear(&mut self) {
        self.by_short.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_short_id_is_deterministic() {
        let a = generate_short_id("MDEyOklzc3VlQ29tbWVudDE=", "acme/widgets");
        let b = generate_short_id("MDEyOklzc3VlQ29tbWVudDE=", "acme/widgets");
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
    }

    #[test]
    fn generate_short_id_depends_on_repo() {
        let a = generate_short_id("same_id_value", "acme/widgets");
        let b = generate_short_id("same_id_value", "acme/gadgets");
        assert_ne!(a, b);
    }

    #[test]
    fn classify_pr_number() {
        assert_eq!(classify_id("1234"), ClassifiedId::PrNumber(1234));
    }

    #[test]
    fn classify_short_id_variants() {
        assert_eq!(
            classify_id("@abc12"),
            ClassifiedId::ShortId("abc12".to_owned())
        );
        assert_eq!(
            classify_id("[@abc12]"),
            ClassifiedId::ShortId("abc12".to_owned())
        );
        assert_eq!(
            classify_id("ABC12"),
            ClassifiedId::ShortId("abc12".to_owned())
        );
        assert_eq!(classify_id("abcd"), ClassifiedId::ShortId("abcd".to_owned()));
    }

    #[test]
    fn classify_full_id() {
        match classify_id("MDEyOklzc3VlQ29tbWVudDEyMzQ1Njc4OQ==_extra") {
            ClassifiedId::FullId(_) => {}
            other => panic!("expected FullId, got {other:?}"),
        }
    }

    #[test]
    fn classify_unknown() {
        assert_eq!(classify_id("!!!"), ClassifiedId::Unknown);
        assert_eq!(classify_id(""), ClassifiedId::Unknown);
    }

    #[test]
    fn format_and_parse_display_id_roundtrip() {
        let short = generate_short_id("abc", "owner/repo");
        let displayed = format_display_id(&short);
        assert_eq!(displayed, format!("[@{short}]"));
        assert_eq!(parse_display_id(&displayed), short);
    }

    #[test]
    fn cache_resolves_registered_target() {
        let target = ShortIdTarget {
            full_id: "abc123".to_owned(),
            repo: "acme/widgets".to_owned(),
            pr: 42,
        };
        let short = generate_short_id(&target.full_id, &target.repo);
        let cache = ShortIdCache::build([target]);
        let resolved = cache.resolve(&short).expect("should resolve");
        assert_eq!(resolved.full_id, "abc123");
        assert_eq!(resolved.pr, 42);
    }

    #[test]
    fn cache_resolve_accepts_display_form() {
        let target = ShortIdTarget {
            full_id: "xyz".to_owned(),
            repo: "acme/widgets".to_owned(),
            pr: 7,
        };
        let short = generate_short_id(&target.full_id, &target.repo);
        let cache = ShortIdCache::build([target]);
        assert!(cache.resolve(&format_display_id(&short)).is_some());
    }

    #[test]
    fn cache_first_registered_wins_on_collision() {
        let mut cache = ShortIdCache::new();
        let first = ShortIdTarget {
            full_id: "first".to_owned(),
            repo: "r".to_owned(),
            pr: 1,
        };
        // Force a collision by inserting directly under a known short id.
        let short = cache.register(first);
        let second = ShortIdTarget {
            full_id: "second".to_owned(),
            repo: "r".to_owned(),
            pr: 2,
        };
        cache.by_short.entry(short.clone()).or_insert(second);
        assert_eq!(cache.resolve(&short).unwrap().full_id, "first");
    }

    #[test]
    fn collision_rate_under_one_percent_for_10k_entries() {
        let mut seen = std::collections::HashSet::new();
        let mut collisions = 0;
        for i in 0..10_000 {
            let id = generate_short_id(&format!("entry-{i}"), "acme/widgets");
            if !seen.insert(id) {
                collisions += 1;
            }
        }
        assert!(
            collisions < 100,
            "expected <1% collisions in 10k entries, got {collisions}"
        );
    }
}
