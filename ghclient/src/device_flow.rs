//! OAuth device authorization for CLI login.
//!
//! The user is shown a short code to enter at `verification_uri` while the
//! CLI polls the token endpoint until GitHub answers with a token or a
//! terminal error.

use std::time::Duration;

use reqwest::{header, Client as ReqwestClient};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{DeviceCode, GitHubError, Result, TokenResponse};

pub const DEVICE_CODE_URL: &str = "https://github.com/login/device/code";
pub const ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const DEVICE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";
pub const SCOPES: &str = "repo workflow";

pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// What one poll of the token endpoint means for the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Token(String),
    Pending,
    SlowDown,
}

/// Map a token endpoint reply to the next step; terminal errors are `Err`.
pub fn classify(response: &TokenResponse) -> Result<PollOutcome> {
    if let Some(token) = &response.access_token {
        return Ok(PollOutcome::Token(token.clone()));
    }
    match response.error.as_deref() {
        Some("authorization_pending") => Ok(PollOutcome::Pending),
        Some("slow_down") => Ok(PollOutcome::SlowDown),
        Some("expired_token") => Err(GitHubError::ExpiredToken),
        Some("access_denied") => Err(GitHubError::AccessDenied),
        Some(other) => Err(GitHubError::DeviceFlow(
            response
                .error_description
                .clone()
                .unwrap_or_else(|| other.to_string()),
        )),
        None => Err(GitHubError::DeviceFlow(
            "token endpoint returned neither a token nor an error".to_string(),
        )),
    }
}

#[derive(Debug, Clone)]
pub struct DeviceFlow {
    client_id: String,
    device_code_url: String,
    token_url: String,
    client: ReqwestClient,
}

impl DeviceFlow {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            device_code_url: DEVICE_CODE_URL.to_string(),
            token_url: ACCESS_TOKEN_URL.to_string(),
            client: ReqwestClient::new(),
        }
    }

    pub fn with_endpoints(
        mut self,
        device_code_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        self.device_code_url = device_code_url.into();
        self.token_url = token_url.into();
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn post<T: DeserializeOwned>(&self, url: &str, body: serde_json::Value) -> Result<T> {
        let response = self
            .client
            .post(url)
            .header(header::ACCEPT, "application/json")
            .header(header::USER_AGENT, crate::client::USER_AGENT)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GitHubError::from_response(status, &text));
        }
        Ok(response.json().await?)
    }

    /// Start a login; show `user_code` and `verification_uri` to the user.
    pub async fn request_device_code(&self) -> Result<DeviceCode> {
        let code: DeviceCode = self
            .post(
                &self.device_code_url,
                json!({ "client_id": self.client_id, "scope": SCOPES }),
            )
            .await?;
        debug!(expires_in = code.expires_in, interval = code.interval, "Got device code");
        Ok(code)
    }

    async fn exchange(&self, code: &DeviceCode) -> Result<TokenResponse> {
        self.post(
            &self.token_url,
            json!({
                "client_id": self.client_id,
                "device_code": code.device_code,
                "grant_type": DEVICE_GRANT_TYPE,
            }),
        )
        .await
    }

    /// Poll until the user authorizes the device, then return the token.
    ///
    /// Waits at least [`MIN_POLL_INTERVAL`] between polls, backs off by
    /// [`SLOW_DOWN_STEP`] on every `slow_down`, and gives up once the code
    /// has expired or `cancel` fires.
    pub async fn poll_for_token(
        &self,
        code: &DeviceCode,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let mut interval = poll_interval(code.interval);
        let deadline = Instant::now() + Duration::from_secs(code.expires_in);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GitHubError::Cancelled),
                _ = tokio::time::sleep(interval) => {}
            }
            if Instant::now() >= deadline {
                return Err(GitHubError::ExpiredToken);
            }

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GitHubError::Cancelled),
                response = self.exchange(code) => response?,
            };
            match classify(&response)? {
                PollOutcome::Token(token) => {
                    info!("Device authorized");
                    return Ok(token);
                }
                PollOutcome::Pending => debug!("Authorization pending"),
                PollOutcome::SlowDown => {
                    interval += SLOW_DOWN_STEP;
                    debug!(interval_secs = interval.as_secs(), "Slowing down");
                }
            }
        }
    }
}

pub fn poll_interval(advertised_secs: u64) -> Duration {
    Duration::from_secs(advertised_secs).max(MIN_POLL_INTERVAL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn reply(token: Option<&str>, error: Option<&str>) -> TokenResponse {
        TokenResponse {
            access_token: token.map(str::to_string),
            error: error.map(str::to_string),
            error_description: None,
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(&reply(Some("gho_abc"), None)).unwrap(),
            PollOutcome::Token("gho_abc".to_string())
        );
        assert_eq!(
            classify(&reply(None, Some("authorization_pending"))).unwrap(),
            PollOutcome::Pending
        );
        assert_eq!(
            classify(&reply(None, Some("slow_down"))).unwrap(),
            PollOutcome::SlowDown
        );
        assert_matches!(
            classify(&reply(None, Some("expired_token"))),
            Err(GitHubError::ExpiredToken)
        );
        assert_matches!(
            classify(&reply(None, Some("access_denied"))),
            Err(GitHubError::AccessDenied)
        );
    }

    #[test]
    fn test_classify_other_error_uses_description() {
        let response = TokenResponse {
            access_token: None,
            error: Some("incorrect_client_credentials".to_string()),
            error_description: Some("The client_id is not valid.".to_string()),
        };
        assert_matches!(
            classify(&response),
            Err(GitHubError::DeviceFlow(msg)) if msg == "The client_id is not valid."
        );
        assert_matches!(classify(&reply(None, None)), Err(GitHubError::DeviceFlow(_)));
    }

    #[test]
    fn test_poll_interval_floor() {
        assert_eq!(poll_interval(0), MIN_POLL_INTERVAL);
        assert_eq!(poll_interval(1), MIN_POLL_INTERVAL);
        assert_eq!(poll_interval(10), Duration::from_secs(10));
    }
}
