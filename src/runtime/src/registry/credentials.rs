//! Registry credential acquisition.
//!
//! Credentials are requested fresh on every run and never written to disk.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use pod_checkpoint_core::AuthorizationData;
use serde::Deserialize;

use crate::exec::{run_checked, CommandRunner, CommandSpec, ToolError};

/// Source of registry authorization tokens.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Request authorization entries for the registry service in `region`.
    async fn authorization(&self, region: &str) -> Result<Vec<AuthorizationData>, ToolError>;
}

/// `aws ecr get-authorization-token` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationResponse {
    #[serde(default)]
    authorization_data: Vec<AuthorizationEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationEntry {
    authorization_token: Option<String>,
    proxy_endpoint: Option<String>,
}

impl std::fmt::Debug for AuthorizationEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationEntry")
            .field("proxy_endpoint", &self.proxy_endpoint)
            .finish_non_exhaustive()
    }
}

/// Amazon ECR credentials via the AWS CLI.
pub struct AwsEcrProvider {
    runner: Arc<dyn CommandRunner>,
    binary: PathBuf,
}

impl AwsEcrProvider {
    pub fn new(runner: Arc<dyn CommandRunner>, binary: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for AwsEcrProvider {
    async fn authorization(&self, region: &str) -> Result<Vec<AuthorizationData>, ToolError> {
        let spec = CommandSpec::new(&self.binary).args([
            "ecr",
            "get-authorization-token",
            "--region",
            region,
            "--output",
            "json",
        ]);
        let output = run_checked(self.runner.as_ref(), &spec).await?;

        let response: AuthorizationResponse =
            serde_json::from_str(&output.stdout).map_err(|e| ToolError::Parse {
                command: spec.to_string(),
                message: e.to_string(),
            })?;

        // Entries missing either field are unusable
        Ok(response
            .authorization_data
            .into_iter()
            .filter_map(|entry| match (entry.authorization_token, entry.proxy_endpoint) {
                (Some(token), Some(endpoint)) => Some(AuthorizationData { token, endpoint }),
                _ => None,
            })
            .collect())
    }
}

/// Extract the login secret from an authorization token.
///
/// ECR tokens are base64 of `<user>:<password>`; the password part is the
/// login secret. Tokens that do not decode to that shape are used verbatim.
pub fn decode_authorization_token(token: &str) -> String {
    base64::engine::general_purpose::STANDARD
        .decode(token.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|decoded| {
            decoded
                .split_once(':')
                .map(|(_, password)| password.to_string())
        })
        .filter(|password| !password.is_empty())
        .unwrap_or_else(|| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedRunner;

    #[tokio::test]
    async fn test_authorization_parses_entries() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_ok(
            r#"{"authorizationData":[{"authorizationToken":"QVdTOnNlY3JldA==","expiresAt":"2026-10-16T12:00:00Z","proxyEndpoint":"https://123456789012.dkr.ecr.us-east-1.amazonaws.com"}]}"#,
        );

        let provider = AwsEcrProvider::new(runner.clone(), "aws");
        let entries = provider.authorization("us-east-1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].endpoint,
            "https://123456789012.dkr.ecr.us-east-1.amazonaws.com"
        );
        assert_eq!(entries[0].token, "QVdTOnNlY3JldA==");

        assert_eq!(
            runner.calls()[0].to_string(),
            "aws ecr get-authorization-token --region us-east-1 --output json"
        );
    }

    #[tokio::test]
    async fn test_authorization_empty_list() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_ok(r#"{"authorizationData":[]}"#);

        let provider = AwsEcrProvider::new(runner, "aws");
        assert!(provider.authorization("us-east-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_authorization_skips_incomplete_entries() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_ok(r#"{"authorizationData":[{"authorizationToken":"abc"}]}"#);

        let provider = AwsEcrProvider::new(runner, "aws");
        assert!(provider.authorization("us-east-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_authorization_provider_error() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_failed(255, "Unable to locate credentials");

        let provider = AwsEcrProvider::new(runner, "aws");
        let err = provider.authorization("us-east-1").await.unwrap_err();
        assert!(err.to_string().contains("Unable to locate credentials"));
    }

    #[test]
    fn test_decode_ecr_token() {
        // base64("AWS:secret")
        assert_eq!(decode_authorization_token("QVdTOnNlY3JldA=="), "secret");
    }

    #[test]
    fn test_decode_keeps_colons_in_password() {
        // base64("AWS:a:b")
        assert_eq!(decode_authorization_token("QVdTOmE6Yg=="), "a:b");
    }

    #[test]
    fn test_decode_opaque_token_passthrough() {
        assert_eq!(decode_authorization_token("not-base64!"), "not-base64!");
        // base64("nocolon")
        assert_eq!(decode_authorization_token("bm9jb2xvbg=="), "bm9jb2xvbg==");
    }
}
