//! GitHub access for the profile build repository: the REST calls used to
//! publish profiles and drive the ISO build workflow, and the OAuth device
//! flow used to obtain a token from the command line.

pub mod client;
pub mod device_flow;
mod error;
mod models;

pub use client::GitHubClient;
pub use device_flow::{DeviceFlow, PollOutcome};
pub use error::{GitHubError, Result};
pub use models::{
    Artifact, DeviceCode, FileContent, FileToPush, GitHubUser, RepoRef, TokenResponse,
    WorkflowRun,
};
