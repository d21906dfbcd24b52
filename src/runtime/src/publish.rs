//! Registry publishing.
//!
//! `Unauthenticated -> Authenticated -> Pushed`, failing at any transition.
//! The credential lives only for the duration of [`RegistryPublisher::publish`]:
//! the push agent logs in to a private auth store that is deleted when the
//! call returns, whatever the outcome.

use std::sync::Arc;

use pod_checkpoint_core::event::{events, EventEmitter, PipelineEvent};
use pod_checkpoint_core::{CheckpointError, PackagedImage, RegistryCredential, Result};

use crate::exec::CommandOutput;
use crate::registry::{decode_authorization_token, CredentialProvider, RegistryPusher};

/// Prefix of the per-publish auth store directory.
const AUTH_DIR_PREFIX: &str = "pod-checkpoint-auth-";

/// File name of the auth store inside that directory.
const AUTH_FILE: &str = "auth.json";

/// Progress of a single publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    Unauthenticated,
    Authenticated,
    Pushed,
}

impl std::fmt::Display for PublishState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "unauthenticated"),
            Self::Authenticated => write!(f, "authenticated"),
            Self::Pushed => write!(f, "pushed"),
        }
    }
}

/// Obtains fresh registry credentials, logs the push agent in and pushes.
pub struct RegistryPublisher {
    credentials: Arc<dyn CredentialProvider>,
    pusher: Arc<dyn RegistryPusher>,
    username: String,
    events: EventEmitter,
}

impl RegistryPublisher {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        pusher: Arc<dyn RegistryPusher>,
        username: impl Into<String>,
        events: EventEmitter,
    ) -> Self {
        Self {
            credentials,
            pusher,
            username: username.into(),
            events,
        }
    }

    /// Push `image` to the registry serving `region`.
    pub async fn publish(&self, image: &PackagedImage, region: &str) -> Result<PublishState> {
        tracing::info!(image = %image, region = %region, "Pushing image");
        let mut state = PublishState::Unauthenticated;

        let credential = self.acquire(region).await?;

        // Removed on drop, on every return path below.
        let auth_dir = tempfile::Builder::new()
            .prefix(AUTH_DIR_PREFIX)
            .tempdir()
            .map_err(|e| CheckpointError::LoginFailed {
                endpoint: credential.endpoint().to_string(),
                message: format!("failed to create auth store: {e}"),
            })?;
        let auth_file = auth_dir.path().join(AUTH_FILE);

        let output = self.pusher.login(&credential, &auth_file).await;
        require_success(output).map_err(|message| CheckpointError::LoginFailed {
            endpoint: credential.endpoint().to_string(),
            message,
        })?;
        state = advance(state, PublishState::Authenticated);
        tracing::info!(endpoint = %credential.endpoint(), "Logged in to registry");
        self.events.emit(PipelineEvent::with_string(
            events::REGISTRY_AUTHENTICATED,
            credential.endpoint(),
        ));
        drop(credential);

        let output = self.pusher.push(image.reference(), &auth_file).await;
        require_success(output).map_err(|message| CheckpointError::PushFailed {
            image: image.to_string(),
            message,
        })?;
        state = advance(state, PublishState::Pushed);

        tracing::info!(image = %image, "Successfully pushed checkpoint image");
        self.events.emit(PipelineEvent::with_string(
            events::IMAGE_PUSHED,
            image.reference(),
        ));

        let auth_path = auth_dir.path().to_path_buf();
        if let Err(e) = auth_dir.close() {
            tracing::warn!(path = %auth_path.display(), error = %e, "Failed to remove auth store");
        }

        Ok(state)
    }

    /// Request a fresh credential; only the first authorization entry is used.
    async fn acquire(&self, region: &str) -> Result<RegistryCredential> {
        tracing::info!(region = %region, "Getting registry authorization token");

        let entries = self
            .credentials
            .authorization(region)
            .await
            .map_err(|e| CheckpointError::CredentialError {
                region: region.to_string(),
                message: e.to_string(),
            })?;

        let first = entries
            .into_iter()
            .next()
            .ok_or_else(|| CheckpointError::CredentialError {
                region: region.to_string(),
                message: "provider returned no authorization data".to_string(),
            })?;

        tracing::info!(endpoint = %first.endpoint, "Retrieved registry authorization token");
        Ok(RegistryCredential::new(
            self.username.clone(),
            decode_authorization_token(&first.token),
            first.endpoint,
        ))
    }
}

fn advance(from: PublishState, to: PublishState) -> PublishState {
    tracing::debug!(from = %from, to = %to, "Publish state");
    to
}

/// Collapse a push-agent result into the agent's diagnostic on failure.
fn require_success(result: std::io::Result<CommandOutput>) -> std::result::Result<(), String> {
    let output = result.map_err(|e| e.to_string())?;
    if output.success() {
        return Ok(());
    }
    let detail = output.combined();
    Err(if detail.is_empty() {
        output.status_description()
    } else {
        format!("{}: {}", output.status_description(), detail)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCredentialProvider, MockRegistryPusher};
    use pod_checkpoint_core::{AuthorizationData, ContainerHandle};

    const ENDPOINT: &str = "https://123456789012.dkr.ecr.us-east-1.amazonaws.com";
    // base64("AWS:secret")
    const TOKEN: &str = "QVdTOnNlY3JldA==";

    fn publisher(
        credentials: MockCredentialProvider,
        pusher: MockRegistryPusher,
    ) -> (
        RegistryPublisher,
        Arc<MockCredentialProvider>,
        Arc<MockRegistryPusher>,
    ) {
        let credentials = Arc::new(credentials);
        let pusher = Arc::new(pusher);
        let publisher = RegistryPublisher::new(
            credentials.clone(),
            pusher.clone(),
            "AWS",
            EventEmitter::default(),
        );
        (publisher, credentials, pusher)
    }

    fn image() -> PackagedImage {
        PackagedImage::for_container("registry/example", &ContainerHandle::new("ctr-9"))
    }

    #[tokio::test]
    async fn test_publish_success() {
        let (publisher, credentials, pusher) = publisher(
            MockCredentialProvider::single(ENDPOINT, TOKEN),
            MockRegistryPusher::new(),
        );

        let state = publisher.publish(&image(), "us-east-1").await.unwrap();
        assert_eq!(state, PublishState::Pushed);
        assert_eq!(credentials.regions(), vec!["us-east-1"]);
        assert_eq!(
            pusher.logins(),
            vec![(ENDPOINT.to_string(), "AWS".to_string())]
        );
        assert_eq!(pusher.pushes(), vec!["registry/example:checkpoint-ctr-9"]);
    }

    #[tokio::test]
    async fn test_auth_store_removed_after_success() {
        let (publisher, _, pusher) = publisher(
            MockCredentialProvider::single(ENDPOINT, TOKEN),
            MockRegistryPusher::new(),
        );

        publisher.publish(&image(), "us-east-1").await.unwrap();

        let auth_files = pusher.auth_files();
        assert_eq!(auth_files.len(), 2);
        assert_eq!(auth_files[0], auth_files[1]);
        assert!(auth_files[0].ends_with(AUTH_FILE));
        assert!(!auth_files[0].exists());
        assert!(!auth_files[0].parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_auth_store_removed_after_push_failure() {
        let (publisher, _, pusher) = publisher(
            MockCredentialProvider::single(ENDPOINT, TOKEN),
            MockRegistryPusher::failing_push(),
        );

        publisher.publish(&image(), "us-east-1").await.unwrap_err();

        let auth_files = pusher.auth_files();
        assert_eq!(auth_files.len(), 2);
        assert!(!auth_files[0].parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_each_publish_uses_its_own_auth_store() {
        let (publisher, _, pusher) = publisher(
            MockCredentialProvider::single(ENDPOINT, TOKEN),
            MockRegistryPusher::new(),
        );

        publisher.publish(&image(), "us-east-1").await.unwrap();
        publisher.publish(&image(), "us-east-1").await.unwrap();

        let auth_files = pusher.auth_files();
        assert_eq!(auth_files.len(), 4);
        assert_ne!(auth_files[0], auth_files[2]);
    }

    #[tokio::test]
    async fn test_empty_authorization_is_credential_error() {
        let (publisher, _, pusher) = publisher(
            MockCredentialProvider::new(Vec::new()),
            MockRegistryPusher::new(),
        );

        let err = publisher.publish(&image(), "us-east-1").await.unwrap_err();
        assert!(matches!(err, CheckpointError::CredentialError { .. }));
        assert!(pusher.logins().is_empty());
        assert!(pusher.pushes().is_empty());
    }

    #[tokio::test]
    async fn test_provider_error_is_credential_error() {
        let (publisher, _, pusher) = publisher(
            MockCredentialProvider::failing("ExpiredTokenException"),
            MockRegistryPusher::new(),
        );

        let err = publisher.publish(&image(), "eu-west-1").await.unwrap_err();
        assert!(matches!(err, CheckpointError::CredentialError { .. }));
        assert!(err.to_string().contains("eu-west-1"));
        assert!(err.to_string().contains("ExpiredTokenException"));
        assert!(pusher.logins().is_empty());
    }

    #[tokio::test]
    async fn test_only_first_entry_is_used() {
        let (publisher, _, pusher) = publisher(
            MockCredentialProvider::new(vec![
                AuthorizationData {
                    token: TOKEN.to_string(),
                    endpoint: "https://first.example".to_string(),
                },
                AuthorizationData {
                    token: TOKEN.to_string(),
                    endpoint: "https://second.example".to_string(),
                },
            ]),
            MockRegistryPusher::new(),
        );

        publisher.publish(&image(), "us-east-1").await.unwrap();
        assert_eq!(pusher.logins().len(), 1);
        assert_eq!(pusher.logins()[0].0, "https://first.example");
    }

    #[tokio::test]
    async fn test_login_failure_skips_push() {
        let (publisher, _, pusher) = publisher(
            MockCredentialProvider::single(ENDPOINT, TOKEN),
            MockRegistryPusher::failing_login(),
        );

        let err = publisher.publish(&image(), "us-east-1").await.unwrap_err();
        assert!(matches!(err, CheckpointError::LoginFailed { .. }));
        assert!(err.to_string().contains("unauthorized"));
        assert!(!err.to_string().contains("secret"));
        assert!(pusher.pushes().is_empty());
        assert!(!pusher.auth_files()[0].parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_push_failure() {
        let (publisher, _, _) = publisher(
            MockCredentialProvider::single(ENDPOINT, TOKEN),
            MockRegistryPusher::failing_push(),
        );

        let err = publisher.publish(&image(), "us-east-1").await.unwrap_err();
        assert!(matches!(err, CheckpointError::PushFailed { .. }));
        assert!(err.to_string().contains("registry/example:checkpoint-ctr-9"));
    }

    #[tokio::test]
    async fn test_each_publish_requests_fresh_credentials() {
        let (publisher, credentials, _) = publisher(
            MockCredentialProvider::single(ENDPOINT, TOKEN),
            MockRegistryPusher::new(),
        );

        publisher.publish(&image(), "us-east-1").await.unwrap();
        publisher.publish(&image(), "us-east-1").await.unwrap();
        assert_eq!(credentials.regions().len(), 2);
    }

    #[test]
    fn test_require_success_messages() {
        assert!(require_success(Ok(CommandOutput::ok(""))).is_ok());
        assert_eq!(
            require_success(Ok(CommandOutput::failed(125, "denied"))).unwrap_err(),
            "exit status 125: denied"
        );
        assert_eq!(
            require_success(Ok(CommandOutput::failed(2, ""))).unwrap_err(),
            "exit status 2"
        );
    }

    #[test]
    fn test_publish_state_display() {
        assert_eq!(PublishState::Unauthenticated.to_string(), "unauthenticated");
        assert_eq!(PublishState::Pushed.to_string(), "pushed");
    }
}
