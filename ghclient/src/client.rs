use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{header, Client as ReqwestClient, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};

use crate::models::{
    ArtifactsResponse, CommitResponse, ContentsResponse, GitObject, PutContentsRequest,
    RefResponse, TreeEntry, WorkflowRunsResponse,
};
use crate::{
    Artifact, FileContent, FileToPush, GitHubError, GitHubUser, RepoRef, Result, WorkflowRun,
};

pub const API_BASE: &str = "https://api.github.com";
pub const ACCEPT_V3: &str = "application/vnd.github.v3+json";
pub const USER_AGENT: &str = "isoadm";

/// A client for the GitHub REST API, authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    api_base: String,
    token: String,
    client: ReqwestClient,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            api_base: API_BASE.to_string(),
            token: token.into(),
            client: ReqwestClient::new(),
        }
    }

    /// Point the client at another API root (GitHub Enterprise, test servers).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Absolute URL of an API path such as `/user`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.endpoint(path))
            .header(header::ACCEPT, ACCEPT_V3)
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(%status, "GitHub API request failed");
        Err(GitHubError::from_response(status, &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.request(Method::GET, path)).await?;
        Ok(response.json().await?)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &impl serde::Serialize,
    ) -> Result<T> {
        let response = self.send(self.request(method, path).json(body)).await?;
        Ok(response.json().await?)
    }

    /// Check the token and return the account it belongs to.
    pub async fn verify_token(&self) -> Result<GitHubUser> {
        self.get_json("/user").await
    }

    /// Whether the token can see `repo`. A 403 or 404 means no access;
    /// other failures are reported as errors.
    pub async fn check_repo_access(&self, repo: &RepoRef) -> Result<bool> {
        let response = self
            .send(self.request(Method::GET, &format!("/repos/{repo}")))
            .await;
        repo_access(response)
    }

    /// Fetch a file through the contents API. Returns `None` if it does not
    /// exist on `branch`.
    pub async fn get_file(
        &self,
        repo: &RepoRef,
        path: &str,
        branch: &str,
    ) -> Result<Option<FileContent>> {
        let path = format!("{}?ref={branch}", contents_path(repo, path));
        match self.get_json::<ContentsResponse>(&path).await {
            Ok(file) => Ok(Some(FileContent {
                content: decode_content(&file.content)?,
                sha: file.sha,
            })),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create or replace a single file in one commit.
    pub async fn put_file(
        &self,
        repo: &RepoRef,
        path: &str,
        content: &str,
        message: &str,
        branch: &str,
    ) -> Result<()> {
        let sha = self.get_file(repo, path, branch).await?.map(|f| f.sha);
        let body = PutContentsRequest {
            message,
            content: STANDARD.encode(content),
            branch,
            sha,
        };
        self.send(
            self.request(Method::PUT, &contents_path(repo, path))
                .json(&body),
        )
        .await?;
        info!(%repo, path, branch, "Updated file");
        Ok(())
    }

    /// Commit several files on top of `branch` and return the new commit sha.
    ///
    /// The steps run one after another; a failure part way leaves the
    /// created blobs and tree unreferenced but the branch untouched.
    pub async fn push_files(
        &self,
        repo: &RepoRef,
        files: &[FileToPush],
        message: &str,
        branch: &str,
    ) -> Result<String> {
        let git = format!("/repos/{repo}/git");

        let head: RefResponse = self.get_json(&format!("{git}/ref/heads/{branch}")).await?;
        let parent: CommitResponse = self
            .get_json(&format!("{git}/commits/{}", head.object.sha))
            .await?;
        debug!(%repo, branch, parent = %parent.sha, "Resolved branch head");

        let mut tree = Vec::with_capacity(files.len());
        for file in files {
            let blob: GitObject = self
                .send_json(
                    Method::POST,
                    &format!("{git}/blobs"),
                    &json!({ "content": file.content, "encoding": "utf-8" }),
                )
                .await?;
            tree.push(TreeEntry {
                path: file.path.clone(),
                mode: "100644",
                kind: "blob",
                sha: blob.sha,
            });
        }

        let new_tree: GitObject = self
            .send_json(
                Method::POST,
                &format!("{git}/trees"),
                &json!({ "base_tree": parent.tree.sha, "tree": tree }),
            )
            .await?;
        let commit: GitObject = self
            .send_json(
                Method::POST,
                &format!("{git}/commits"),
                &json!({
                    "message": message,
                    "tree": new_tree.sha,
                    "parents": [head.object.sha],
                }),
            )
            .await?;
        self.send(
            self.request(Method::PATCH, &format!("{git}/refs/heads/{branch}"))
                .json(&json!({ "sha": commit.sha })),
        )
        .await?;

        info!(%repo, branch, commit = %commit.sha, files = files.len(), "Pushed files");
        Ok(commit.sha)
    }

    /// Start a `workflow_dispatch` run.
    pub async fn trigger_workflow(
        &self,
        repo: &RepoRef,
        workflow: &str,
        git_ref: &str,
        inputs: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.send(
            self.request(
                Method::POST,
                &format!("/repos/{repo}/actions/workflows/{workflow}/dispatches"),
            )
            .json(&json!({ "ref": git_ref, "inputs": inputs })),
        )
        .await?;
        info!(%repo, workflow, git_ref, "Triggered workflow");
        Ok(())
    }

    /// Most recent runs of `workflow`, newest first.
    pub async fn workflow_runs(
        &self,
        repo: &RepoRef,
        workflow: &str,
        limit: u32,
    ) -> Result<Vec<WorkflowRun>> {
        let runs: WorkflowRunsResponse = self
            .get_json(&format!(
                "/repos/{repo}/actions/workflows/{workflow}/runs?per_page={limit}"
            ))
            .await?;
        Ok(runs.workflow_runs)
    }

    pub async fn run_artifacts(&self, repo: &RepoRef, run_id: u64) -> Result<Vec<Artifact>> {
        let artifacts: ArtifactsResponse = self
            .get_json(&format!("/repos/{repo}/actions/runs/{run_id}/artifacts"))
            .await?;
        Ok(artifacts.artifacts)
    }
}

fn repo_access<T>(response: Result<T>) -> Result<bool> {
    match response {
        Ok(_) => Ok(true),
        Err(GitHubError::Api {
            status: 403 | 404, ..
        }) => Ok(false),
        Err(e) => Err(e),
    }
}

fn contents_path(repo: &RepoRef, path: &str) -> String {
    format!("/repos/{repo}/contents/{}", path.trim_start_matches('/'))
}

/// The contents API wraps its base64 at 60 columns.
pub fn decode_content(encoded: &str) -> Result<String> {
    let compact: String = encoded.split_whitespace().collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| GitHubError::Decode(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| GitHubError::Decode(e.to_string()))
}
