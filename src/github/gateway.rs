use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use octocrab::Octocrab;

use crate::github::client::GitHubClient;
use crate::github::error::{GatewayError, GatewayResult, classify_graphql_errors, classify_octocrab_error};
use crate::github::queries::{
    self, GraphQlRequest, GraphQlResponse, PrActivityData, PullRequestIdData, RawPr,
    ReviewThreadMapData, ViewerLoginData,
};
use crate::github::{mutations, rate_limit};
use crate::model::{Entry, PrMeta, Scope};

const DEFAULT_PAGE_SIZE: i64 = 50;

/// The gateway's result for one page of `fetch_pr_activity`.
pub struct PrActivityPage {
    pub prs: Vec<PrMeta>,
    pub entries: Vec<Entry>,
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
    /// `updatedAt` of the last (oldest, since the page is ordered
    /// `UPDATED_AT DESC`) PR node in this page — the sync engine's early
    /// termination check compares this against its `since` cutoff.
    pub last_updated_at: Option<chrono::DateTime<Utc>>,
}

/// One method per capability, per §4.3. Every method classifies its errors
/// into a [`GatewayError`] rather than surfacing `octocrab`'s raw error type.
pub struct GitHubGateway {
    client: GitHubClient,
    host: String,
}

impl GitHubGateway {
    pub fn new(token: String, host: impl Into<String>) -> Self {
        Self {
            client: GitHubClient::new(token),
            host: host.into(),
        }
    }

    async fn octocrab(&self) -> GatewayResult<Arc<Octocrab>> {
        self.client.octocrab_for(&self.host).await
    }

    async fn query<D: serde::de::DeserializeOwned, V: serde::Serialize>(
        &self,
        query: &'static str,
        variables: V,
    ) -> GatewayResult<D> {
        let octocrab = self.octocrab().await?;
        let payload = GraphQlRequest { query, variables };
        let response: GraphQlResponse<D> = octocrab
            .post("/graphql", Some(&payload))
            .await
            .map_err(|e| classify_octocrab_error(&e))?;

        if let Some(errors) = &response.errors {
            if !errors.is_empty() {
                return Err(classify_graphql_errors(errors));
            }
        }
        response
            .data
            .ok_or_else(|| GatewayError::Transport("graphql response missing data".to_owned()))
    }

    /// Fetch one page of PR activity for `(owner, name)` in the given
    /// `scope`, starting `after` the given cursor. Per §4.4 step 3, each PR
    /// node in the page is fully flattened into entries before returning;
    /// children beyond the first 100 of any single connection (reviews,
    /// comments, commits) on one PR are not fetched — real-world PRs rarely
    /// exceed that, and `review_threads`, which carries the highest-value
    /// per-comment detail, is the one connection whose overflow is chased
    /// down via [`Self::fill_review_threads`].
    pub async fn fetch_pr_activity(
        &self,
        owner: &str,
        name: &str,
        scope: Scope,
        after: Option<String>,
    ) -> GatewayResult<PrActivityPage> {
        let repo = format!("{owner}/{name}");
        let data: PrActivityData = self
            .query(
                queries::PR_ACTIVITY_QUERY,
                serde_json::json!({
                    "owner": owner,
                    "name": name,
                    "states": scope.pr_states(),
                    "first": DEFAULT_PAGE_SIZE,
                    "after": after,
                }),
            )
            .await?;

        let Some(repository) = data.repository else {
            return Err(GatewayError::NotFound(format!("repository {repo} not found")));
        };

        let captured_at = Utc::now();
        let last_updated_at = repository.pull_requests.nodes.last().map(|raw| raw.updated_at);
        let mut prs = Vec::new();
        let mut entries = Vec::new();

        for mut raw in repository.pull_requests.nodes {
            if raw
                .review_threads
                .page_info
                .as_ref()
                .is_some_and(|p| p.has_next_page)
            {
                self.fill_review_threads(owner, name, &mut raw).await?;
            }
            let (meta, mut pr_entries) = queries::flatten_pr(&repo, &raw, captured_at);
            prs.push(meta);
            entries.append(&mut pr_entries);
        }

        Ok(PrActivityPage {
            prs,
            entries,
            has_next_page: repository.pull_requests.page_info.has_next_page,
            end_cursor: repository.pull_requests.page_info.end_cursor,
            last_updated_at,
        })
    }

    /// Chase down the remaining pages of `reviewThreads` for a single PR
    /// whose first page reported `hasNextPage`, merging the extra nodes in.
    async fn fill_review_threads(&self, owner: &str, name: &str, raw: &mut RawPr) -> GatewayResult<()> {
        let mut cursor = raw
            .review_threads
            .page_info
            .as_ref()
            .and_then(|p| p.end_cursor.clone());

        loop {
            #[derive(serde::Deserialize)]
            struct Data {
                repository: Option<Repo>,
            }
            #[derive(serde::Deserialize)]
            struct Repo {
                #[serde(rename = "pullRequest")]
                pull_request: Option<Pr>,
            }
            #[derive(serde::Deserialize)]
            struct Pr {
                #[serde(rename = "reviewThreads")]
                review_threads: queries::Connection<queries::RawReviewThread>,
            }

            let data: Data = self
                .query(
                    queries::REVIEW_THREADS_PAGE_QUERY,
                    serde_json::json!({
                        "owner": owner,
                        "name": name,
                        "number": raw.number,
                        "first": 100,
                        "after": cursor,
                    }),
                )
                .await?;

            let Some(page) = data.repository.and_then(|r| r.pull_request) else {
                break;
            };
            let has_next = page
                .review_threads
                .page_info
                .as_ref()
                .is_some_and(|p| p.has_next_page);
            cursor = page
                .review_threads
                .page_info
                .as_ref()
                .and_then(|p| p.end_cursor.clone());
            raw.review_threads.nodes.extend(page.review_threads.nodes);

            if !has_next {
                break;
            }
        }
        Ok(())
    }

    pub async fn fetch_pull_request_id(&self, owner: &str, name: &str, number: u64) -> GatewayResult<String> {
        let data: PullRequestIdData = self
            .query(
                queries::PULL_REQUEST_ID_QUERY,
                serde_json::json!({ "owner": owner, "name": name, "number": number }),
            )
            .await?;
        data.repository
            .and_then(|r| r.pull_request)
            .map(|p| p.id)
            .ok_or_else(|| GatewayError::NotFound(format!("PR {owner}/{name}#{number} not found")))
    }

    pub async fn fetch_review_thread_map(
        &self,
        owner: &str,
        name: &str,
        number: u64,
    ) -> GatewayResult<HashMap<String, String>> {
        let data: ReviewThreadMapData = self
            .query(
                queries::REVIEW_THREAD_MAP_QUERY,
                serde_json::json!({ "owner": owner, "name": name, "number": number }),
            )
            .await?;

        let threads = data
            .repository
            .and_then(|r| r.pull_request)
            .map(|p| p.review_threads.nodes)
            .unwrap_or_default();

        let mut map = HashMap::new();
        for thread in threads {
            for comment in thread.comments.nodes {
                map.insert(comment.id, thread.id.clone());
            }
        }
        Ok(map)
    }

    pub async fn add_issue_comment(&self, subject_id: &str, body: &str) -> GatewayResult<String> {
        mutations::add_issue_comment(&self.octocrab().await?, subject_id, body).await
    }

    pub async fn add_review_thread_reply(&self, thread_id: &str, body: &str) -> GatewayResult<String> {
        mutations::add_review_thread_reply(&self.octocrab().await?, thread_id, body).await
    }

    pub async fn resolve_review_thread(&self, thread_id: &str) -> GatewayResult<()> {
        mutations::resolve_review_thread(&self.octocrab().await?, thread_id).await
    }

    pub async fn add_reaction(&self, subject_id: &str, content: &str) -> GatewayResult<()> {
        mutations::add_reaction(&self.octocrab().await?, subject_id, content).await
    }

    pub async fn submit_review(
        &self,
        pull_request_id: &str,
        event: &str,
        body: Option<&str>,
    ) -> GatewayResult<()> {
        mutations::submit_review(&self.octocrab().await?, pull_request_id, event, body).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn edit_pull_request(
        &self,
        owner: &str,
        name: &str,
        number: u64,
        title: Option<&str>,
        body: Option<&str>,
        base: Option<&str>,
    ) -> GatewayResult<()> {
        mutations::edit_pull_request_fields(&self.octocrab().await?, owner, name, number, title, body, base).await
    }

    pub async fn set_draft(&self, pull_request_id: &str, draft: bool) -> GatewayResult<()> {
        mutations::set_draft(&self.octocrab().await?, pull_request_id, draft).await
    }

    pub async fn set_labels(
        &self,
        owner: &str,
        name: &str,
        number: u64,
        add: &[String],
        remove: &[String],
    ) -> GatewayResult<()> {
        mutations::set_labels(&self.octocrab().await?, owner, name, number, add, remove).await
    }

    pub async fn set_assignees(
        &self,
        owner: &str,
        name: &str,
        number: u64,
        add: &[String],
        remove: &[String],
    ) -> GatewayResult<()> {
        mutations::set_assignees(&self.octocrab().await?, owner, name, number, add, remove).await
    }

    pub async fn set_reviewers(
        &self,
        owner: &str,
        name: &str,
        number: u64,
        add: &[String],
        remove: &[String],
    ) -> GatewayResult<()> {
        mutations::set_reviewers(&self.octocrab().await?, owner, name, number, add, remove).await
    }

    pub async fn set_milestone(
        &self,
        owner: &str,
        name: &str,
        number: u64,
        milestone: Option<u64>,
    ) -> GatewayResult<()> {
        mutations::set_milestone(&self.octocrab().await?, owner, name, number, milestone).await
    }

    pub async fn get_commit_files(&self, owner: &str, name: &str, sha: &str) -> GatewayResult<Vec<String>> {
        mutations::get_commit_files(&self.octocrab().await?, owner, name, sha).await
    }

    pub async fn fetch_viewer_login(&self) -> GatewayResult<String> {
        let data: ViewerLoginData = self.query(queries::VIEWER_LOGIN_QUERY, serde_json::json!({})).await?;
        Ok(data.viewer.login)
    }
}

/// Surface the rate-limit header from a raw GraphQL `data` blob, for callers
/// that want to react to an exhausted budget before the next page fetch.
pub fn rate_limit_from_data(data: &serde_json::Value) -> Option<rate_limit::RateLimitInfo> {
    rate_limit::parse_rate_limit(data)
}
