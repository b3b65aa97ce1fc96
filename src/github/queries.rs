//! GraphQL query strings and response parsing for read paths.
//!
//! Shaped after the teacher's `github/graphql.rs`: a `rateLimit` header on
//! every query, `pageInfo { hasNextPage endCursor }` on every paginated
//! connection, and a raw (camelCase, `Option`-heavy) response type per query
//! that gets converted into the domain model at the edge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Entry, EntryType, PrMeta, PrState, ReviewState};

pub const PR_ACTIVITY_QUERY: &str = r"
query PrActivity($owner: String!, $name: String!, $states: [PullRequestState!], $first: Int!, $after: String) {
  rateLimit { limit remaining cost resetAt }
  repository(owner: $owner, name: $name) {
    pullRequests(states: $states, first: $first, after: $after, orderBy: { field: UPDATED_AT, direction: DESC }) {
      pageInfo { hasNextPage endCursor }
      nodes {
        number
        title
        state
        isDraft
        url
        createdAt
        updatedAt
        author { login }
        headRefName
        labels(first: 50) { nodes { name } }
        reviews(first: 100) {
          pageInfo { hasNextPage endCursor }
          nodes { id author { login } state body submittedAt url }
        }
        comments(first: 100) {
          pageInfo { hasNextPage endCursor }
          nodes { id author { login } body createdAt updatedAt url }
        }
        reviewThreads(first: 100) {
          pageInfo { hasNextPage endCursor }
          nodes {
            id
            isResolved
            path
            line
            comments(first: 50) {
              nodes { id author { login } body createdAt updatedAt url }
            }
          }
        }
        commits(first: 100) {
          pageInfo { hasNextPage endCursor }
          nodes {
            commit {
              oid
              message
              committedDate
              author { user { login } }
              statusCheckRollup { state }
            }
          }
        }
      }
    }
  }
}
";

pub const REVIEW_THREADS_PAGE_QUERY: &str = r"
query ReviewThreadsPage($owner: String!, $name: String!, $number: Int!, $first: Int!, $after: String) {
  rateLimit { limit remaining cost resetAt }
  repository(owner: $owner, name: $name) {
    pullRequest(number: $number) {
      reviewThreads(first: $first, after: $after) {
        pageInfo { hasNextPage endCursor }
        nodes {
          id
          isResolved
          path
          line
          comments(first: 50) {
            nodes { id author { login } body createdAt updatedAt url }
          }
        }
      }
    }
  }
}
";

pub const PULL_REQUEST_ID_QUERY: &str = r"
query PullRequestId($owner: String!, $name: String!, $number: Int!) {
  rateLimit { limit remaining cost resetAt }
  repository(owner: $owner, name: $name) {
    pullRequest(number: $number) { id }
  }
}
";

pub const REVIEW_THREAD_MAP_QUERY: &str = r"
query ReviewThreadMap($owner: String!, $name: String!, $number: Int!) {
  rateLimit { limit remaining cost resetAt }
  repository(owner: $owner, name: $name) {
    pullRequest(number: $number) {
      reviewThreads(first: 100) {
        pageInfo { hasNextPage endCursor }
        nodes {
          id
          comments(first: 100) { nodes { id } }
        }
      }
    }
  }
}
";

pub const VIEWER_LOGIN_QUERY: &str = r"
query ViewerLogin {
  rateLimit { limit remaining cost resetAt }
  viewer { login }
}
";

#[derive(Serialize)]
pub struct GraphQlRequest<V: Serialize> {
    pub query: &'static str,
    pub variables: V,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<D> {
    pub data: Option<D>,
    pub errors: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageInfo {
    #[serde(rename = "hasNextPage")]
    pub has_next_page: bool,
    #[serde(rename = "endCursor")]
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PrActivityData {
    pub repository: Option<PrActivityRepo>,
}

#[derive(Debug, Deserialize)]
pub struct PrActivityRepo {
    #[serde(rename = "pullRequests")]
    pub pull_requests: PrConnection,
}

#[derive(Debug, Deserialize)]
pub struct PrConnection {
    #[serde(rename = "pageInfo")]
    pub page_info: PageInfo,
    #[serde(default)]
    pub nodes: Vec<RawPr>,
}

#[derive(Debug, Deserialize)]
pub struct RawPr {
    pub number: u64,
    pub title: String,
    pub state: RawPrLifecycleState,
    #[serde(rename = "isDraft", default)]
    pub is_draft: bool,
    pub url: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    pub author: Option<RawActor>,
    #[serde(rename = "headRefName", default)]
    pub head_ref_name: String,
    #[serde(default)]
    pub labels: Connection<RawLabel>,
    #[serde(default)]
    pub reviews: Connection<RawReview>,
    #[serde(default)]
    pub comments: Connection<RawIssueComment>,
    #[serde(rename = "reviewThreads", default)]
    pub review_threads: Connection<RawReviewThread>,
    #[serde(default)]
    pub commits: Connection<RawCommitNode>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Connection<T> {
    #[serde(rename = "pageInfo")]
    pub page_info: Option<PageInfo>,
    #[serde(default)]
    pub nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RawPrLifecycleState {
    Open,
    Closed,
    Merged,
}

#[derive(Debug, Deserialize)]
pub struct RawActor {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct RawLabel {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RawReview {
    pub id: String,
    pub author: Option<RawActor>,
    pub state: RawReviewState,
    #[serde(default)]
    pub body: String,
    #[serde(rename = "submittedAt")]
    pub submitted_at: Option<DateTime<Utc>>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RawReviewState {
    Pending,
    Commented,
    Approved,
    ChangesRequested,
    Dismissed,
}

#[derive(Debug, Deserialize)]
pub struct RawIssueComment {
    pub id: String,
    pub author: Option<RawActor>,
    #[serde(default)]
    pub body: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawReviewThread {
    pub id: String,
    #[serde(rename = "isResolved", default)]
    pub is_resolved: bool,
    pub path: Option<String>,
    pub line: Option<u32>,
    #[serde(default)]
    pub comments: Connection<RawIssueComment>,
}

#[derive(Debug, Deserialize)]
pub struct RawCommitNode {
    pub commit: RawCommit,
}

#[derive(Debug, Deserialize)]
pub struct RawCommit {
    pub oid: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "committedDate")]
    pub committed_date: DateTime<Utc>,
    pub author: Option<RawCommitAuthor>,
    #[serde(rename = "statusCheckRollup")]
    pub status_check_rollup: Option<RawStatusCheckRollup>,
}

#[derive(Debug, Deserialize)]
pub struct RawCommitAuthor {
    pub user: Option<RawActor>,
}

#[derive(Debug, Deserialize)]
pub struct RawStatusCheckRollup {
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestIdData {
    pub repository: Option<PullRequestIdRepo>,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestIdRepo {
    #[serde(rename = "pullRequest")]
    pub pull_request: Option<RawNodeId>,
}

#[derive(Debug, Deserialize)]
pub struct RawNodeId {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewThreadMapData {
    pub repository: Option<ReviewThreadMapRepo>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewThreadMapRepo {
    #[serde(rename = "pullRequest")]
    pub pull_request: Option<ReviewThreadMapPr>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewThreadMapPr {
    #[serde(rename = "reviewThreads")]
    pub review_threads: Connection<ReviewThreadMapNode>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewThreadMapNode {
    pub id: String,
    pub comments: Connection<RawNodeId>,
}

#[derive(Debug, Deserialize)]
pub struct ViewerLoginData {
    pub viewer: RawActor,
}

/// Map a PR's `state`/`isDraft` pair to our `PrState`, per §4.4.
pub fn map_pr_state(state: &RawPrLifecycleState, is_draft: bool) -> PrState {
    if is_draft {
        return PrState::Draft;
    }
    match state {
        RawPrLifecycleState::Open => PrState::Open,
        RawPrLifecycleState::Closed => PrState::Closed,
        RawPrLifecycleState::Merged => PrState::Merged,
    }
}

fn map_review_state(state: &RawReviewState) -> ReviewState {
    match state {
        RawReviewState::Pending => ReviewState::Pending,
        RawReviewState::Commented => ReviewState::Commented,
        RawReviewState::Approved => ReviewState::Approved,
        RawReviewState::ChangesRequested => ReviewState::ChangesRequested,
        RawReviewState::Dismissed => ReviewState::Dismissed,
    }
}

/// Flatten one `RawPr` node (with however much of its child connections has
/// been assembled by the caller's pagination loop) into `(PrMeta, Vec<Entry>)`,
/// per the algorithm in §4.4 step 3.
pub fn flatten_pr(repo: &str, raw: &RawPr, captured_at: DateTime<Utc>) -> (PrMeta, Vec<Entry>) {
    let pr_state = map_pr_state(&raw.state, raw.is_draft);
    let pr_author = raw
        .author
        .as_ref()
        .map(|a| a.login.clone())
        .unwrap_or_else(|| "ghost".to_owned());
    let labels: Vec<String> = raw.labels.nodes.iter().map(|l| l.name.clone()).collect();

    let meta = PrMeta {
        repo: repo.to_owned(),
        number: raw.number,
        state: pr_state,
        is_draft: raw.is_draft,
        title: raw.title.clone(),
        author: pr_author.clone(),
        branch: raw.head_ref_name.clone(),
        labels: labels.clone(),
    };

    let mut entries = Vec::new();

    for review in &raw.reviews.nodes {
        entries.push(Entry {
            id: review.id.clone(),
            repo: repo.to_owned(),
            pr: raw.number,
            entry_type: EntryType::Review,
            subtype: None,
            author: review.author.as_ref().map_or_else(
                || "ghost".to_owned(),
                |a| a.login.clone(),
            ),
            body: Some(review.body.clone()),
            state: Some(map_review_state(&review.state)),
            file: None,
            line: None,
            thread_id: None,
            thread_resolved: None,
            created_at: review.submitted_at.unwrap_or(captured_at),
            updated_at: None,
            captured_at,
            url: review.url.clone(),
            pr_title: raw.title.clone(),
            pr_state,
            pr_author: pr_author.clone(),
            pr_branch: raw.head_ref_name.clone(),
            pr_labels: Some(labels.clone()),
            graphite: None,
            file_provenance: None,
            file_activity_after: None,
        });
    }

    for comment in &raw.comments.nodes {
        entries.push(issue_comment_entry(repo, raw.number, &meta, comment, captured_at));
    }

    for thread in &raw.review_threads.nodes {
        for comment in &thread.comments.nodes {
            entries.push(review_comment_entry(repo, raw.number, &meta, thread, comment, captured_at));
        }
    }

    for commit in &raw.commits.nodes {
        entries.push(commit_entry(repo, raw.number, &meta, commit, captured_at));
    }

    if let Some(last) = raw.commits.nodes.last() {
        if let Some(rollup) = &last.commit.status_check_rollup {
            entries.push(ci_entry(repo, raw.number, &meta, last, rollup, captured_at));
        }
    }

    (meta, entries)
}

fn issue_comment_entry(
    repo: &str,
    pr: u64,
    meta: &PrMeta,
    comment: &RawIssueComment,
    captured_at: DateTime<Utc>,
) -> Entry {
    Entry {
        id: comment.id.clone(),
        repo: repo.to_owned(),
        pr,
        entry_type: EntryType::Comment,
        subtype: Some("issue_comment".to_owned()),
        author: comment
            .author
            .as_ref()
            .map_or_else(|| "ghost".to_owned(), |a| a.login.clone()),
        body: Some(comment.body.clone()),
        state: None,
        file: None,
        line: None,
        thread_id: None,
        thread_resolved: None,
        created_at: comment.created_at,
        updated_at: comment.updated_at,
        captured_at,
        url: comment.url.clone(),
        pr_title: meta.title.clone(),
        pr_state: meta.state,
        pr_author: meta.author.clone(),
        pr_branch: meta.branch.clone(),
        pr_labels: Some(meta.labels.clone()),
        graphite: None,
        file_provenance: None,
        file_activity_after: None,
    }
}

fn review_comment_entry(
    repo: &str,
    pr: u64,
    meta: &PrMeta,
    thread: &RawReviewThread,
    comment: &RawIssueComment,
    captured_at: DateTime<Utc>,
) -> Entry {
    Entry {
        id: comment.id.clone(),
        repo: repo.to_owned(),
        pr,
        entry_type: EntryType::Comment,
        subtype: Some("review_comment".to_owned()),
        author: comment
            .author
            .as_ref()
            .map_or_else(|| "ghost".to_owned(), |a| a.login.clone()),
        body: Some(comment.body.clone()),
        state: None,
        file: thread.path.clone(),
        line: thread.line,
        thread_id: Some(thread.id.clone()),
        thread_resolved: Some(thread.is_resolved),
        created_at: comment.created_at,
        updated_at: comment.updated_at,
        captured_at,
        url: comment.url.clone(),
        pr_title: meta.title.clone(),
        pr_state: meta.state,
        pr_author: meta.author.clone(),
        pr_branch: meta.branch.clone(),
        pr_labels: Some(meta.labels.clone()),
        graphite: None,
        file_provenance: None,
        file_activity_after: None,
    }
}

fn ci_entry(
    repo: &str,
    pr: u64,
    meta: &PrMeta,
    commit: &RawCommitNode,
    rollup: &RawStatusCheckRollup,
    captured_at: DateTime<Utc>,
) -> Entry {
    Entry {
        id: format!("{}-ci", commit.commit.oid),
        repo: repo.to_owned(),
        pr,
        entry_type: EntryType::Ci,
        subtype: Some(rollup.state.to_lowercase()),
        author: "github-actions".to_owned(),
        body: None,
        state: None,
        file: None,
        line: None,
        thread_id: None,
        thread_resolved: None,
        created_at: commit.commit.committed_date,
        updated_at: None,
        captured_at,
        url: None,
        pr_title: meta.title.clone(),
        pr_state: meta.state,
        pr_author: meta.author.clone(),
        pr_branch: meta.branch.clone(),
        pr_labels: Some(meta.labels.clone()),
        graphite: None,
        file_provenance: None,
        file_activity_after: None,
    }
}

fn commit_entry(
    repo: &str,
    pr: u64,
    meta: &PrMeta,
    commit: &RawCommitNode,
    captured_at: DateTime<Utc>,
) -> Entry {
    let c = &commit.commit;
    Entry {
        id: c.oid.clone(),
        repo: repo.to_owned(),
        pr,
        entry_type: EntryType::Commit,
        subtype: None,
        author: c
            .author
            .as_ref()
            .and_then(|a| a.user.as_ref())
            .map_or_else(|| "ghost".to_owned(), |a| a.login.clone()),
        body: Some(c.message.clone()),
        state: None,
        file: None,
        line: None,
        thread_id: None,
        thread_resolved: None,
        created_at: c.committed_date,
        updated_at: None,
        captured_at,
        url: None,
        pr_title: meta.title.clone(),
        pr_state: meta.state,
        pr_author: meta.author.clone(),
        pr_branch: meta.branch.clone(),
        pr_labels: Some(meta.labels.clone()),
        graphite: None,
        file_provenance: None,
        file_activity_after: None,
    }
}
