//! Enrichers run over every entry flattened from a sync page, in
//! registration order, per §4.4's enricher contract: `enrich(entry) ->
//! entry`, total and side-effect-free apart from reads of external state
//! (`gt state`, `git diff`). A failing enricher leaves the entry unenriched
//! rather than aborting the page.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::model::{Entry, FileProvenance, GraphiteContext};
use crate::stack::{Direction, StackProvider};

#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, entry: Entry) -> Entry;
}

/// Attaches `{stack_id, stack_position, stack_size, parent_pr}` to every
/// entry whose PR branch is part of a known stack.
pub struct GraphiteEnricher {
    provider: Arc<dyn StackProvider>,
}

impl GraphiteEnricher {
    pub fn new(provider: Arc<dyn StackProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Enricher for GraphiteEnricher {
    async fn enrich(&self, mut entry: Entry) -> Entry {
        let Some(position) = self.provider.get_stack_for_branch(&entry.pr_branch).await else {
            return entry;
        };
        let stacks = self.provider.get_stacks().await;
        let Some(stack) = stacks.iter().find(|s| s.id == position.stack) else {
            return entry;
        };

        let parent_pr = if position.index > 0 {
            self.provider
                .get_stack_prs(&entry.pr_branch, Direction::All)
                .await
                .and_then(|prs| prs.prs.get(position.index as usize - 1).copied())
        } else {
            None
        };

        entry.graphite = Some(GraphiteContext {
            stack_id: stack.id.clone(),
            stack_position: position.index + 1,
            stack_size: stack.branches.len() as u32,
            parent_pr,
        });
        entry
    }
}

/// Attributes a review-comment's `file` to the stacked PR that first
/// introduced it, by diffing each stacked branch against its immediate
/// predecessor (trunk for the bottommost) and taking the lowest stack
/// position whose diff contains the file.
pub struct FileProvenanceEnricher {
    provider: Arc<dyn StackProvider>,
    repo_path: PathBuf,
}

impl FileProvenanceEnricher {
    pub fn new(provider: Arc<dyn StackProvider>, repo_path: PathBuf) -> Self {
        Self { provider, repo_path }
    }
}

#[async_trait]
impl Enricher for FileProvenanceEnricher {
    async fn enrich(&self, mut entry: Entry) -> Entry {
        if !entry.is_review_comment() {
            return entry;
        }
        let Some(file) = entry.file.clone() else {
            return entry;
        };
        let Some(position) = self.provider.get_stack_for_branch(&entry.pr_branch).await else {
            return entry;
        };
        let stacks = self.provider.get_stacks().await;
        let Some(stack) = stacks.iter().find(|s| s.id == position.stack) else {
            return entry;
        };
        let Some(trunk) = self.provider.trunk().await else {
            return entry;
        };
        let Some(prs) = self
            .provider
            .get_stack_prs(&entry.pr_branch, Direction::All)
            .await
        else {
            return entry;
        };

        for (index, branch) in stack.branches.iter().enumerate() {
            let parent = if index == 0 { trunk.as_str() } else { stack.branches[index - 1].as_str() };
            let Some(diff) = crate::git::diff_name_only(&self.repo_path, parent, branch) else {
                continue;
            };
            if diff.iter().any(|f| f == &file) {
                let origin_commit = crate::git::rev_parse(&self.repo_path, branch).unwrap_or_default();
                entry.file_provenance = Some(FileProvenance {
                    origin_pr: prs.prs.get(index).copied().unwrap_or(0),
                    origin_branch: branch.clone(),
                    origin_commit,
                    stack_position: index as u32 + 1,
                });
                break;
            }
        }
        entry
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::model::{EntryType, PrState};
    use crate::stack::{Stack, StackPosition, StackPrs};

    struct FixedStackProvider {
        position: Option<StackPosition>,
        stacks: Vec<Stack>,
        prs: Vec<u64>,
    }

    #[async_trait]
    impl StackProvider for FixedStackProvider {
        async fn is_available(&self) -> bool {
            true
        }
        async fn get_stacks(&self) -> Vec<Stack> {
            self.stacks.clone()
        }
        async fn get_stack_for_branch(&self, _branch: &str) -> Option<StackPosition> {
            self.position.clone()
        }
        async fn get_stack_prs(&self, _branch: &str, direction: Direction) -> Option<StackPrs> {
            Some(StackPrs {
                prs: self.prs.clone(),
                current_pr: None,
                stack: self.position.as_ref()?.stack.clone(),
                direction,
            })
        }
        async fn trunk(&self) -> Option<String> {
            Some("main".to_owned())
        }
        fn clear_cache(&self) {}
    }

    fn sample_entry() -> Entry {
        Entry {
            id: "abc".into(),
            repo: "acme/widgets".into(),
            pr: 2,
            entry_type: EntryType::Comment,
            subtype: Some("issue_comment".into()),
            author: "alice".into(),
            body: None,
            state: None,
            file: None,
            line: None,
            thread_id: None,
            thread_resolved: None,
            created_at: chrono::Utc::now(),
            updated_at: None,
            captured_at: chrono::Utc::now(),
            url: None,
            pr_title: "Title".into(),
            pr_state: PrState::Open,
            pr_author: "bob".into(),
            pr_branch: "feature-2".into(),
            pr_labels: None,
            graphite: None,
            file_provenance: None,
            file_activity_after: None,
        }
    }

    #[tokio::test]
    async fn graphite_enricher_attaches_context_and_parent_pr() {
        let provider = Arc::new(FixedStackProvider {
            position: Some(StackPosition {
                stack: "feature-2".into(),
                index: 1,
                branch: "feature-2".into(),
            }),
            stacks: vec![Stack {
                id: "feature-2".into(),
                branches: vec!["feature-1".into(), "feature-2".into()],
            }],
            prs: vec![1, 2],
        });
        let enricher = GraphiteEnricher::new(provider);
        let entry = enricher.enrich(sample_entry()).await;
        let graphite = entry.graphite.expect("should be enriched");
        assert_eq!(graphite.stack_position, 2);
        assert_eq!(graphite.stack_size, 2);
        assert_eq!(graphite.parent_pr, Some(1));
    }

    #[tokio::test]
    async fn graphite_enricher_leaves_non_stacked_entry_untouched() {
        let provider = Arc::new(FixedStackProvider {
            position: None,
            stacks: vec![],
            prs: vec![],
        });
        let enricher = GraphiteEnricher::new(provider);
        let entry = enricher.enrich(sample_entry()).await;
        assert!(entry.graphite.is_none());
    }
}
