//! Stack providers: external tools (today, only Graphtie) that describe
//! how branches are stacked on top of one another. §4.8.

mod graphite;

pub use graphite::GraphiteStackProvider;

use async_trait::async_trait;

/// One stacked sequence of branches, trunk excluded, ordered bottom-up.
#[derive(Debug, Clone, PartialEq)]
pub struct Stack {
    pub id: String,
    pub branches: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StackPosition {
    pub stack: String,
    pub index: u32,
    pub branch: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    All,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StackPrs {
    pub prs: Vec<u64>,
    pub current_pr: Option<u64>,
    pub stack: String,
    pub direction: Direction,
}

/// Interface a stack tool must implement, per §4.8.
#[async_trait]
pub trait StackProvider: Send + Sync {
    async fn is_available(&self) -> bool;
    async fn get_stacks(&self) -> Vec<Stack>;
    async fn get_stack_for_branch(&self, branch: &str) -> Option<StackPosition>;
    async fn get_stack_prs(&self, branch: &str, direction: Direction) -> Option<StackPrs>;
    /// The trunk branch name, when a stack tool is available. Used by the
    /// file-provenance enricher to diff the bottommost stacked branch
    /// against something.
    async fn trunk(&self) -> Option<String>;
    fn clear_cache(&self);
}
