//! Write-path mutations, mirrored after `actions/pr_actions.rs`: GraphQL
//! mutations posted as raw `Octocrab::post("/graphql", ...)` bodies where
//! the REST API has no equivalent (review threads, reactions), and REST
//! verbs where it does (editing a PR, merging, assigning).

use std::sync::Arc;

use octocrab::Octocrab;
use serde::Serialize;
use serde_json::Value as Json;

use crate::github::error::{GatewayError, GatewayResult};
use crate::github::queries::{GraphQlRequest, GraphQlResponse};

async fn post_graphql<V: Serialize>(
    octocrab: &Arc<Octocrab>,
    query: &'static str,
    variables: V,
) -> GatewayResult<Json> {
    let payload = GraphQlRequest { query, variables };
    let response: GraphQlResponse<Json> = octocrab
        .post("/graphql", Some(&payload))
        .await
        .map_err(|e| crate::github::error::classify_octocrab_error(&e))?;

    if let Some(errors) = response.errors {
        if !errors.is_empty() {
            return Err(crate::github::error::classify_graphql_errors(&errors));
        }
    }
    response
        .data
        .ok_or_else(|| GatewayError::Transport("graphql response missing data".to_owned()))
}

const ADD_ISSUE_COMMENT_MUTATION: &str = r"
mutation AddIssueComment($subjectId: ID!, $body: String!) {
  addComment(input: { subjectId: $subjectId, body: $body }) {
    commentEdge { node { id url } }
  }
}
";

pub async fn add_issue_comment(
    octocrab: &Arc<Octocrab>,
    subject_id: &str,
    body: &str,
) -> GatewayResult<String> {
    let data = post_graphql(
        octocrab,
        ADD_ISSUE_COMMENT_MUTATION,
        serde_json::json!({ "subjectId": subject_id, "body": body }),
    )
    .await?;
    data.pointer("/addComment/commentEdge/node/id")
        .and_then(Json::as_str)
        .map(str::to_owned)
        .ok_or_else(|| GatewayError::Transport("addComment response missing node id".to_owned()))
}

const ADD_REVIEW_THREAD_REPLY_MUTATION: &str = r"
mutation AddReviewThreadReply($pullRequestReviewThreadId: ID!, $body: String!) {
  addPullRequestReviewThreadReply(input: { pullRequestReviewThreadId: $pullRequestReviewThreadId, body: $body }) {
    comment { id url }
  }
}
";

pub async fn add_review_thread_reply(
    octocrab: &Arc<Octocrab>,
    thread_id: &str,
    body: &str,
) -> GatewayResult<String> {
    let data = post_graphql(
        octocrab,
        ADD_REVIEW_THREAD_REPLY_MUTATION,
        serde_json::json!({ "pullRequestReviewThreadId": thread_id, "body": body }),
    )
    .await?;
    data.pointer("/addPullRequestReviewThreadReply/comment/id")
        .and_then(Json::as_str)
        .map(str::to_owned)
        .ok_or_else(|| {
            GatewayError::Transport("addPullRequestReviewThreadReply response missing id".to_owned())
        })
}

const RESOLVE_REVIEW_THREAD_MUTATION: &str = r"
mutation ResolveReviewThread($threadId: ID!) {
  resolveReviewThread(input: { threadId: $threadId }) {
    thread { id isResolved }
  }
}
";

pub async fn resolve_review_thread(octocrab: &Arc<Octocrab>, thread_id: &str) -> GatewayResult<()> {
    post_graphql(
        octocrab,
        RESOLVE_REVIEW_THREAD_MUTATION,
        serde_json::json!({ "threadId": thread_id }),
    )
    .await?;
    Ok(())
}

const ADD_REACTION_MUTATION: &str = r"
mutation AddReaction($subjectId: ID!, $content: ReactionContent!) {
  addReaction(input: { subjectId: $subjectId, content: $content }) {
    reaction { id content }
  }
}
";

pub async fn add_reaction(
    octocrab: &Arc<Octocrab>,
    subject_id: &str,
    content: &str,
) -> GatewayResult<()> {
    post_graphql(
        octocrab,
        ADD_REACTION_MUTATION,
        serde_json::json!({ "subjectId": subject_id, "content": content }),
    )
    .await?;
    Ok(())
}

const SUBMIT_REVIEW_MUTATION: &str = r"
mutation SubmitReview($pullRequestId: ID!, $event: PullRequestReviewEvent!, $body: String) {
  addPullRequestReview(input: { pullRequestId: $pullRequestId, event: $event, body: $body }) {
    pullRequestReview { id state }
  }
}
";

/// `event` must be one of `APPROVE`, `REQUEST_CHANGES`, `COMMENT` (§4.9).
pub async fn submit_review(
    octocrab: &Arc<Octocrab>,
    pull_request_id: &str,
    event: &str,
    body: Option<&str>,
) -> GatewayResult<()> {
    post_graphql(
        octocrab,
        SUBMIT_REVIEW_MUTATION,
        serde_json::json!({ "pullRequestId": pull_request_id, "event": event, "body": body }),
    )
    .await?;
    Ok(())
}

/// Edit a PR's title/body/base branch via REST, grounded on the teacher's
/// `pr_actions::close`/`reopen` PATCH pattern.
pub async fn edit_pull_request_fields(
    octocrab: &Arc<Octocrab>,
    owner: &str,
    repo: &str,
    number: u64,
    title: Option<&str>,
    body: Option<&str>,
    base: Option<&str>,
) -> GatewayResult<()> {
    let route = format!("/repos/{owner}/{repo}/pulls/{number}");
    let mut payload = serde_json::Map::new();
    if let Some(title) = title {
        payload.insert("title".into(), Json::String(title.to_owned()));
    }
    if let Some(body) = body {
        payload.insert("body".into(), Json::String(body.to_owned()));
    }
    if let Some(base) = base {
        payload.insert("base".into(), Json::String(base.to_owned()));
    }
    let _: Json = octocrab
        .patch(route, Some(&Json::Object(payload)))
        .await
        .map_err(|e| crate::github::error::classify_octocrab_error(&e))?;
    Ok(())
}

pub async fn set_draft(
    octocrab: &Arc<Octocrab>,
    pull_request_id: &str,
    draft: bool,
) -> GatewayResult<()> {
    let query = if draft {
        r"mutation($id: ID!) { convertPullRequestToDraft(input: { pullRequestId: $id }) { pullRequest { id } } }"
    } else {
        r"mutation($id: ID!) { markPullRequestReadyForReview(input: { pullRequestId: $id }) { pullRequest { id } } }"
    };
    post_graphql(octocrab, query, serde_json::json!({ "id": pull_request_id })).await?;
    Ok(())
}

pub async fn set_labels(
    octocrab: &Arc<Octocrab>,
    owner: &str,
    repo: &str,
    number: u64,
    add: &[String],
    remove: &[String],
) -> GatewayResult<()> {
    if !add.is_empty() {
        let route = format!("/repos/{owner}/{repo}/issues/{number}/labels");
        let _: Json = octocrab
            .post(route, Some(&serde_json::json!({ "labels": add })))
            .await
            .map_err(|e| crate::github::error::classify_octocrab_error(&e))?;
    }
    for label in remove {
        let route = format!("/repos/{owner}/{repo}/issues/{number}/labels/{label}");
        octocrab
            .delete::<_, ()>(route, None)
            .await
            .map_err(|e| crate::github::error::classify_octocrab_error(&e))?;
    }
    Ok(())
}

pub async fn set_assignees(
    octocrab: &Arc<Octocrab>,
    owner: &str,
    repo: &str,
    number: u64,
    add: &[String],
    remove: &[String],
) -> GatewayResult<()> {
    if !add.is_empty() {
        let route = format!("/repos/{owner}/{repo}/issues/{number}/assignees");
        let _: Json = octocrab
            .post(route, Some(&serde_json::json!({ "assignees": add })))
            .await
            .map_err(|e| crate::github::error::classify_octocrab_error(&e))?;
    }
    if !remove.is_empty() {
        let route = format!("/repos/{owner}/{repo}/issues/{number}/assignees");
        let _: Json = octocrab
            .delete(route, Some(&serde_json::json!({ "assignees": remove })))
            .await
            .map_err(|e| crate::github::error::classify_octocrab_error(&e))?;
    }
    Ok(())
}

pub async fn set_reviewers(
    octocrab: &Arc<Octocrab>,
    owner: &str,
    repo: &str,
    number: u64,
    add: &[String],
    remove: &[String],
) -> GatewayResult<()> {
    let route = format!("/repos/{owner}/{repo}/pulls/{number}/requested_reviewers");
    if !add.is_empty() {
        let _: Json = octocrab
            .post(route.clone(), Some(&serde_json::json!({ "reviewers": add })))
            .await
            .map_err(|e| crate::github::error::classify_octocrab_error(&e))?;
    }
    if !remove.is_empty() {
        let _: Json = octocrab
            .delete(route, Some(&serde_json::json!({ "reviewers": remove })))
            .await
            .map_err(|e| crate::github::error::classify_octocrab_error(&e))?;
    }
    Ok(())
}

pub async fn set_milestone(
    octocrab: &Arc<Octocrab>,
    owner: &str,
    repo: &str,
    number: u64,
    milestone: Option<u64>,
) -> GatewayResult<()> {
    let route = format!("/repos/{owner}/{repo}/issues/{number}");
    let _: Json = octocrab
        .patch(route, Some(&serde_json::json!({ "milestone": milestone })))
        .await
        .map_err(|e| crate::github::error::classify_octocrab_error(&e))?;
    Ok(())
}

pub async fn get_commit_files(
    octocrab: &Arc<Octocrab>,
    owner: &str,
    repo: &str,
    sha: &str,
) -> GatewayResult<Vec<String>> {
    let route = format!("/repos/{owner}/{repo}/commits/{sha}");
    let response: Json = octocrab
        .get(route, None::<&()>)
        .await
        .map_err(|e| crate::github::error::classify_octocrab_error(&e))?;
    let files = response
        .get("files")
        .and_then(Json::as_array)
        .map(|files| {
            files
                .iter()
                .filter_map(|f| f.get("filename").and_then(Json::as_str))
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();
    Ok(files)
}
