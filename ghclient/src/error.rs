use miette::Diagnostic;
use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T, E = GitHubError> = std::result::Result<T, E>;

#[derive(Error, Debug, Diagnostic)]
pub enum GitHubError {
    #[error("Not authenticated")]
    #[diagnostic(code(github::not_authenticated), help("run `isoadm github login` first"))]
    NotAuthenticated,

    /// Non-success response; `message` is GitHub's own error text when the
    /// body carried one.
    #[error("{message}")]
    #[diagnostic(code(github::api))]
    Api { status: u16, message: String },

    #[error("invalid repository '{0}' (expected owner/name)")]
    #[diagnostic(code(github::repository))]
    InvalidRepository(String),

    #[error("could not decode file content: {0}")]
    Decode(String),

    #[error("Authorization denied by user.")]
    #[diagnostic(code(github::access_denied))]
    AccessDenied,

    #[error("Authorization expired. Please try again.")]
    #[diagnostic(code(github::expired_token))]
    ExpiredToken,

    #[error("{0}")]
    #[diagnostic(code(github::device_flow))]
    DeviceFlow(String),

    #[error("authorization cancelled")]
    Cancelled,

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl GitHubError {
    /// Build the error for a failed response from its status and raw body.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("GitHub API error: {}", status.as_u16()));
        GitHubError::Api {
            status: status.as_u16(),
            message,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GitHubError::Api { status: 404, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_message_is_surfaced() {
        let err = GitHubError::from_response(StatusCode::NOT_FOUND, r#"{"message":"Not Found"}"#);
        assert_eq!(err.to_string(), "Not Found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_status_fallback() {
        let err = GitHubError::from_response(StatusCode::BAD_GATEWAY, "<html>oops</html>");
        assert_eq!(err.to_string(), "GitHub API error: 502");
        assert!(!err.is_not_found());
    }
}
