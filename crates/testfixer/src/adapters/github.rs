//! GitHub source repository.
//!
//! Publishing a draft is a short sequence of REST calls:
//!
//! ```text
//! GET  /repos/{o}/{r}/commits/{base}          → head sha of the base branch
//! POST /repos/{o}/{r}/git/refs                → new branch at that sha
//! PUT  /repos/{o}/{r}/contents/{path}         → one commit per changed file
//! POST /repos/{o}/{r}/pulls                   → pull request
//! POST /repos/{o}/{r}/issues/{n}/labels       → labels (best effort)
//! ```

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::json;
use triage::{ChangeOperation, CreatedPullRequest, FileChange, PullRequestDraft};

use crate::collaborators::{CollaboratorError, SourceRepository};

const SERVICE: &str = "GitHub";
const USER_AGENT: &str = concat!("testfixer/", env!("CARGO_PKG_VERSION"));
const JSON_ACCEPT: &str = "application/vnd.github+json";
const DIFF_ACCEPT: &str = "application/vnd.github.v3.diff";

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    html_url: String,
    number: u64,
}

/// [`SourceRepository`] backed by the GitHub REST API.
pub struct GitHubClient {
    token: String,
    base_url: String,
    client: reqwest::Client,
}

impl GitHubClient {
    pub fn new(
        token: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            token: token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn repo_url(&self, owner: &str, repo: &str, rest: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.base_url, owner, repo, rest)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.request_as(method, url, JSON_ACCEPT)
    }

    /// Requests go out anonymously when no token is configured, which is
    /// enough to read public repositories.
    fn request_as(&self, method: reqwest::Method, url: &str, accept: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header("Accept", accept)
            .header("X-GitHub-Api-Version", "2022-11-28");
        if self.token.trim().is_empty() {
            builder
        } else {
            builder.header("Authorization", format!("Bearer {}", self.token))
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, CollaboratorError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 404 {
            return Err(CollaboratorError::NotFound(url));
        }
        Err(CollaboratorError::api(SERVICE, status.as_u16(), body))
    }

    async fn contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<ContentsResponse, CollaboratorError> {
        let url = self.repo_url(owner, repo, &format!("contents/{}", path));
        let mut builder = self.request(reqwest::Method::GET, &url);
        if let Some(git_ref) = git_ref {
            builder = builder.query(&[("ref", git_ref)]);
        }
        self.send(builder)
            .await?
            .json()
            .await
            .map_err(|e| CollaboratorError::Decode(e.to_string()))
    }

    /// Blob sha of `path` on `branch`, `None` when the file does not exist.
    async fn existing_sha(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<Option<String>, CollaboratorError> {
        match self.contents(owner, repo, path, Some(branch)).await {
            Ok(contents) => Ok(Some(contents.sha)),
            Err(CollaboratorError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn branch_head(&self, owner: &str, repo: &str, branch: &str) -> Result<String, CollaboratorError> {
        let url = self.repo_url(owner, repo, &format!("commits/{}", branch));
        let commit: CommitResponse = self
            .send(self.request(reqwest::Method::GET, &url))
            .await?
            .json()
            .await
            .map_err(|e| CollaboratorError::Decode(e.to_string()))?;
        Ok(commit.sha)
    }

    async fn create_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        sha: &str,
    ) -> Result<(), CollaboratorError> {
        let url = self.repo_url(owner, repo, "git/refs");
        let body = json!({ "ref": format!("refs/heads/{}", branch), "sha": sha });
        self.send(self.request(reqwest::Method::POST, &url).json(&body))
            .await?;
        Ok(())
    }

    async fn commit_change(
        &self,
        draft: &PullRequestDraft,
        change: &FileChange,
    ) -> Result<(), CollaboratorError> {
        let url = self.repo_url(&draft.owner, &draft.repo, &format!("contents/{}", change.path));
        let existing = self
            .existing_sha(&draft.owner, &draft.repo, &change.path, &draft.branch_name)
            .await?;

        let builder = match change.operation {
            ChangeOperation::Create | ChangeOperation::Update => {
                let mut body = json!({
                    "message": draft.commit_message,
                    "content": BASE64.encode(change.content.as_bytes()),
                    "branch": draft.branch_name,
                });
                if let Some(sha) = existing {
                    body["sha"] = json!(sha);
                }
                self.request(reqwest::Method::PUT, &url).json(&body)
            }
            ChangeOperation::Delete => {
                let Some(sha) = existing else {
                    tracing::debug!(path = %change.path, "file already absent, nothing to delete");
                    return Ok(());
                };
                let body = json!({
                    "message": draft.commit_message,
                    "sha": sha,
                    "branch": draft.branch_name,
                });
                self.request(reqwest::Method::DELETE, &url).json(&body)
            }
        };

        self.send(builder).await?;
        Ok(())
    }

    async fn add_labels(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        labels: &[String],
    ) -> Result<(), CollaboratorError> {
        let url = self.repo_url(owner, repo, &format!("issues/{}/labels", number));
        self.send(
            self.request(reqwest::Method::POST, &url)
                .json(&json!({ "labels": labels })),
        )
        .await?;
        Ok(())
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Decode a contents-API payload (base64 wrapped at 60 columns).
fn decode_content(contents: &ContentsResponse) -> Result<String, CollaboratorError> {
    if !contents.encoding.is_empty() && contents.encoding != "base64" {
        return Err(CollaboratorError::Decode(format!(
            "unsupported content encoding {:?}",
            contents.encoding
        )));
    }
    let compact: String = contents
        .content
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let bytes = BASE64
        .decode(compact)
        .map_err(|e| CollaboratorError::Decode(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| CollaboratorError::Decode(e.to_string()))
}

#[async_trait]
impl SourceRepository for GitHubClient {
    async fn get_file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<String, CollaboratorError> {
        let contents = self.contents(owner, repo, path, git_ref).await?;
        decode_content(&contents)
    }

    async fn get_commit_diff(
        &self,
        owner: &str,
        repo: &str,
        commit_sha: &str,
    ) -> Result<String, CollaboratorError> {
        let url = self.repo_url(owner, repo, &format!("commits/{}", commit_sha));
        let response = self
            .send(self.request_as(reqwest::Method::GET, &url, DIFF_ACCEPT))
            .await?;
        Ok(response.text().await?)
    }

    async fn create_pull_request(
        &self,
        draft: &PullRequestDraft,
    ) -> Result<CreatedPullRequest, CollaboratorError> {
        let head = self
            .branch_head(&draft.owner, &draft.repo, &draft.base_branch)
            .await?;
        self.create_branch(&draft.owner, &draft.repo, &draft.branch_name, &head)
            .await?;
        tracing::info!(branch = %draft.branch_name, base = %draft.base_branch, "created fix branch");

        for change in &draft.changes {
            self.commit_change(draft, change).await?;
        }

        let url = self.repo_url(&draft.owner, &draft.repo, "pulls");
        let body = json!({
            "title": draft.title,
            "body": draft.description,
            "head": draft.branch_name,
            "base": draft.base_branch,
        });
        let pull: PullResponse = self
            .send(self.request(reqwest::Method::POST, &url).json(&body))
            .await?
            .json()
            .await
            .map_err(|e| CollaboratorError::Decode(e.to_string()))?;

        if !draft.labels.is_empty() {
            if let Err(e) = self
                .add_labels(&draft.owner, &draft.repo, pull.number, &draft.labels)
                .await
            {
                tracing::warn!(number = pull.number, error = %e, "failed to label pull request");
            }
        }

        Ok(CreatedPullRequest {
            url: pull.html_url,
            number: pull.number,
            branch_name: draft.branch_name.clone(),
            files_changed: draft.changes.len(),
        })
    }
}
