//! Transient entities of a single pipeline run.

use std::path::{Path, PathBuf};

/// Opaque pod identifier supplied by the caller.
///
/// Only used as a substring match key against container labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodIdentifier(String);

impl PodIdentifier {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PodIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a runtime-managed container instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerHandle(String);

impl ContainerHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Filesystem location of a captured checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointArtifact {
    path: PathBuf,
}

impl CheckpointArtifact {
    /// Deterministic artifact path for a container: `<root>/checkpoint-<id>`.
    pub fn path_for(root: &Path, container: &ContainerHandle) -> PathBuf {
        root.join(format!("checkpoint-{}", container.id()))
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reference to an image committed to the local image store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedImage {
    reference: String,
}

impl PackagedImage {
    /// Compute the image reference for a container: `<repo>:checkpoint-<id>`.
    pub fn for_container(repository: &str, container: &ContainerHandle) -> Self {
        Self {
            reference: format!("{}:checkpoint-{}", repository, container.id()),
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }
}

impl std::fmt::Display for PackagedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reference)
    }
}

/// One entry of a registry authorization response.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizationData {
    /// Encoded authorization token
    pub token: String,
    /// Registry endpoint URL (e.g. `https://123.dkr.ecr.us-east-1.amazonaws.com`)
    pub endpoint: String,
}

impl std::fmt::Debug for AuthorizationData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationData")
            .field("token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Short-lived registry login secret plus the endpoint it is valid for.
///
/// Never cached or persisted; `Debug` redacts the secret.
#[derive(Clone)]
pub struct RegistryCredential {
    username: String,
    secret: String,
    endpoint: String,
}

impl RegistryCredential {
    pub fn new(
        username: impl Into<String>,
        secret: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
            endpoint: endpoint.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl std::fmt::Debug for RegistryCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCredential")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
