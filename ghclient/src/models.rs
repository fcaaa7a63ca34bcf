use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::GitHubError;

/// `owner/name` of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = GitHubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(RepoRef::new(owner, name))
            }
            _ => Err(GitHubError::InvalidRepository(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubUser {
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Decoded file from the contents API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub content: String,
    pub sha: String,
}

/// A file to include in a multi-file commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileToPush {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    pub status: String,
    pub conclusion: Option<String>,
    pub created_at: String,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Artifact {
    pub id: u64,
    pub name: String,
    pub size_in_bytes: u64,
    pub archive_download_url: String,
}

/// Answer to a device authorization request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceCode {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    /// Seconds until `device_code` expires.
    pub expires_in: u64,
    /// Minimum polling interval in seconds.
    pub interval: u64,
}

// Wire types of the REST endpoints used by the client.

#[derive(Debug, Deserialize)]
pub(crate) struct ContentsResponse {
    pub content: String,
    pub sha: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PutContentsRequest<'a> {
    pub message: &'a str,
    pub content: String,
    pub branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitObject {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefResponse {
    pub object: GitObject,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitResponse {
    pub sha: String,
    pub tree: GitObject,
}

#[derive(Debug, Serialize)]
pub(crate) struct TreeEntry {
    pub path: String,
    pub mode: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkflowRunsResponse {
    pub workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ArtifactsResponse {
    pub artifacts: Vec<Artifact>,
}

/// Token endpoint reply: either a token or an error code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}
