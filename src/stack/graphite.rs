//! Graphite (`gt`) stack provider.
//!
//! `gt state` emits a flat map `branch -> {trunk?, parents: [{ref, sha}]}`.
//! We invert the parent edges into a child adjacency list, find the unique
//! trunk branch, and treat any non-trunk branch with no children as a stack
//! leaf. Walking a leaf's parents up to (but excluding) the trunk and
//! reversing gives the stack bottom-up. PR numbers are attached afterward
//! via the external PR-listing CLI (`gh pr list --json`), keyed by branch.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::stack::{Direction, Stack, StackPosition, StackProvider, StackPrs};

const SUBPROCESS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Deserialize)]
struct RawBranchParent {
    #[serde(rename = "ref")]
    branch_ref: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RawBranchState {
    #[serde(default)]
    trunk: bool,
    #[serde(default)]
    parents: Vec<RawBranchParent>,
}

struct CachedState {
    trunk: String,
    stacks: Vec<Stack>,
}

pub struct GraphiteStackProvider {
    cache: Mutex<Option<CachedState>>,
}

impl Default for GraphiteStackProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphiteStackProvider {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(None),
        }
    }

    async fn state(&self) -> Option<CachedState> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = compute_state().await;
        }
        cache.as_ref().map(|s| CachedState {
            trunk: s.trunk.clone(),
            stacks: s.stacks.clone(),
        })
    }

    async fn stacks(&self) -> Vec<Stack> {
        self.state().await.map(|s| s.stacks).unwrap_or_default()
    }
}

#[async_trait]
impl StackProvider for GraphiteStackProvider {
    async fn is_available(&self) -> bool {
        run_with_timeout("gt", &["--version"]).await.is_some()
    }

    async fn get_stacks(&self) -> Vec<Stack> {
        self.stacks().await
    }

    async fn get_stack_for_branch(&self, branch: &str) -> Option<StackPosition> {
        let stacks = self.stacks().await;
        for stack in &stacks {
            if let Some(index) = stack.branches.iter().position(|b| b == branch) {
                return Some(StackPosition {
                    stack: stack.id.clone(),
                    index: index as u32,
                    branch: branch.to_owned(),
                });
            }
        }
        None
    }

    async fn get_stack_prs(&self, branch: &str, direction: Direction) -> Option<StackPrs> {
        let position = self.get_stack_for_branch(branch).await?;
        let stacks = self.stacks().await;
        let stack = stacks.iter().find(|s| s.id == position.stack)?;

        let branches: Vec<&String> = match direction {
            Direction::Up => stack.branches[position.index as usize..].iter().collect(),
            Direction::Down => stack.branches[..=position.index as usize].iter().collect(),
            Direction::All => stack.branches.iter().collect(),
        };

        let pr_by_branch = fetch_prs_by_branch().await.unwrap_or_default();
        let prs: Vec<u64> = branches.iter().filter_map(|b| pr_by_branch.get(b.as_str()).copied()).collect();
        let current_pr = pr_by_branch.get(branch).copied();

        Some(StackPrs {
            prs,
            current_pr,
            stack: stack.id.clone(),
            direction,
        })
    }

    async fn trunk(&self) -> Option<String> {
        self.state().await.map(|s| s.trunk)
    }

    fn clear_cache(&self) {
        // `Mutex::blocking_lock` would deadlock inside an async context;
        // callers (tests) that need synchronous clearing use `try_lock`,
        // which is safe here because the cache itself never holds the lock
        // across an await point.
        if let Ok(mut cache) = self.cache.try_lock() {
            *cache = None;
        }
    }
}

async fn compute_state() -> Option<CachedState> {
    let output = run_with_timeout("gt", &["state", "--json"]).await?;
    let states: HashMap<String, RawBranchState> = serde_json::from_str(&output).ok()?;

    let trunk = states.iter().find(|(_, s)| s.trunk).map(|(name, _)| name.clone())?;

    let mut children: HashMap<String, Vec<String>> = HashMap::new();
    for (branch, state) in &states {
        for parent in &state.parents {
            children.entry(parent.branch_ref.clone()).or_default().push(branch.clone());
        }
    }

    let leaves: Vec<String> = states
        .keys()
        .filter(|branch| *branch != &trunk && !children.contains_key(*branch))
        .cloned()
        .collect();

    let mut stacks = Vec::new();
    for leaf in leaves {
        let mut path = vec![leaf.clone()];
        let mut current = leaf.clone();
        while let Some(state) = states.get(&current) {
            let Some(parent) = state.parents.first() else { break };
            if parent.branch_ref == trunk {
                break;
            }
            path.push(parent.branch_ref.clone());
            current = parent.branch_ref.clone();
        }
        path.reverse();
        stacks.push(Stack {
            id: leaf,
            branches: path,
        });
    }

    Some(CachedState { trunk, stacks })
}

async fn fetch_prs_by_branch() -> Option<HashMap<String, u64>> {
    let output = run_with_timeout(
        "gh",
        &[
            "pr", "list", "--state", "open", "--json", "number,headRefName", "--limit", "200",
        ],
    )
    .await?;

    #[derive(Deserialize)]
    struct RawPr {
        number: u64,
        #[serde(rename = "headRefName")]
        head_ref_name: String,
    }

    let prs: Vec<RawPr> = serde_json::from_str(&output).ok()?;
    Some(prs.into_iter().map(|pr| (pr.head_ref_name, pr.number)).collect())
}

async fn run_with_timeout(program: &str, args: &[&str]) -> Option<String> {
    let child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output();

    let output = tokio::time::timeout(SUBPROCESS_TIMEOUT, child).await.ok()?.ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_states() -> HashMap<String, RawBranchState> {
        let mut states = HashMap::new();
        states.insert(
            "main".to_owned(),
            RawBranchState {
                trunk: true,
                parents: vec![],
            },
        );
        states.insert(
            "feature-1".to_owned(),
            RawBranchState {
                trunk: false,
                parents: vec![RawBranchParent {
                    branch_ref: "main".to_owned(),
                }],
            },
        );
        states.insert(
            "feature-2".to_owned(),
            RawBranchState {
                trunk: false,
                parents: vec![RawBranchParent {
                    branch_ref: "feature-1".to_owned(),
                }],
            },
        );
        states
    }

    #[test]
    fn leaf_walk_produces_bottom_up_order() {
        let states = sample_states();
        let trunk = states.iter().find(|(_, s)| s.trunk).map(|(n, _)| n.clone()).unwrap();
        assert_eq!(trunk, "main");

        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        for (branch, state) in &states {
            for parent in &state.parents {
                children.entry(parent.branch_ref.clone()).or_default().push(branch.clone());
            }
        }
        let leaves: Vec<&String> = states
            .keys()
            .filter(|b| *b != &trunk && !children.contains_key(*b))
            .collect();
        assert_eq!(leaves, vec![&"feature-2".to_owned()]);
    }

    #[tokio::test]
    async fn clear_cache_resets_memoized_stacks() {
        let provider = GraphiteStackProvider::new();
        *provider.cache.lock().await = Some(CachedState {
            trunk: "main".to_owned(),
            stacks: vec![Stack {
                id: "feature-2".to_owned(),
                branches: vec!["feature-1".to_owned(), "feature-2".to_owned()],
            }],
        });
        provider.clear_cache();
        assert!(provider.cache.lock().await.is_none());
    }
}
