use chrono::{DateTime, Utc};

use crate::model::{EntryType, PrState};

/// One or many PR numbers.
#[derive(Debug, Clone)]
pub enum PrSelector {
    Single(u64),
    Many(Vec<u64>),
}

/// One or many entry types.
#[derive(Debug, Clone)]
pub enum TypeSelector {
    Single(EntryType),
    Many(Vec<EntryType>),
}

/// The SQL-pushable subset of the filter shape described in §4.2: repo, PR
/// set, type set, state set, label-contains, since/before, author equality,
/// and id. The query engine (§4.6) layers the remaining client-side
/// refinements (author include-list, exclude list, bot detection, freeze
/// cutoff, orphaned) on top of what the store returns.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub repo: Option<String>,
    /// When true, `repo` must match exactly; otherwise it's a prefix/contains
    /// match allowing host-qualified or partial repo slugs.
    pub exact_repo: bool,
    pub pr: Option<PrSelector>,
    pub entry_type: Option<TypeSelector>,
    pub states: Vec<PrState>,
    /// Partial (substring) match against any of a PR's labels.
    pub label: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    /// Exact-match author equality, pushed into SQL.
    pub author: Option<String>,
    pub id: Option<String>,
}

impl EntryFilter {
    pub fn for_repo(repo: impl Into<String>) -> Self {
        Self {
            repo: Some(repo.into()),
            exact_repo: true,
            ..Default::default()
        }
    }
}
