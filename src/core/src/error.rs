use std::time::Duration;

use thiserror::Error;

/// Sub-operation of the image packaging stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackagingStep {
    /// Instantiate an empty build context
    FromScratch,
    /// Copy the checkpoint tree into the build context root
    Copy,
    /// Commit the build context under the target reference
    Commit,
}

impl std::fmt::Display for PackagingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FromScratch => write!(f, "from-scratch"),
            Self::Copy => write!(f, "copy"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// Checkpoint pipeline error types
///
/// Every variant is terminal for a run. Variants carry the stage context
/// (operation and identifiers) alongside the collaborator's message.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Connecting to or listing the container runtime failed
    #[error("Container runtime unavailable: {operation} in namespace {namespace} - {message}")]
    RuntimeUnavailable {
        operation: String,
        namespace: String,
        message: String,
    },

    /// No container carries the pod identifier
    #[error("Container not found for pod {pod} in namespace {namespace}")]
    NotFound { pod: String, namespace: String },

    /// The runtime's checkpoint operation failed
    #[error("Checkpoint failed for container {container}: {message}, output: {output}")]
    CheckpointFailed {
        container: String,
        message: String,
        output: String,
    },

    /// Checkpoint capture exceeded its configured bound
    #[error("Timeout: {operation} for container {container} exceeded {limit:?}")]
    Timeout {
        operation: String,
        container: String,
        limit: Duration,
    },

    /// One of the build-engine sub-operations failed
    #[error("Packaging failed at {step} for image {image}: {message}")]
    PackagingFailed {
        step: PackagingStep,
        image: String,
        message: String,
    },

    /// Registry credentials could not be obtained
    #[error("Registry credential error in region {region}: {message}")]
    CredentialError { region: String, message: String },

    /// The push agent could not authenticate to the registry
    #[error("Registry login failed for {endpoint}: {message}")]
    LoginFailed { endpoint: String, message: String },

    /// The push agent could not transfer the image
    #[error("Push failed for image {image}: {message}")]
    PushFailed { image: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Stable classification of a [`CheckpointError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RuntimeUnavailable,
    NotFound,
    CheckpointFailed,
    Timeout,
    PackagingFailed,
    CredentialError,
    LoginFailed,
    PushFailed,
    ConfigError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::RuntimeUnavailable => "RuntimeUnavailable",
            Self::NotFound => "NotFound",
            Self::CheckpointFailed => "CheckpointFailed",
            Self::Timeout => "Timeout",
            Self::PackagingFailed => "PackagingFailed",
            Self::CredentialError => "CredentialError",
            Self::LoginFailed => "LoginFailed",
            Self::PushFailed => "PushFailed",
            Self::ConfigError => "ConfigError",
        };
        f.write_str(name)
    }
}

impl CheckpointError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RuntimeUnavailable { .. } => ErrorKind::RuntimeUnavailable,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::CheckpointFailed { .. } => ErrorKind::CheckpointFailed,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::PackagingFailed { .. } => ErrorKind::PackagingFailed,
            Self::CredentialError { .. } => ErrorKind::CredentialError,
            Self::LoginFailed { .. } => ErrorKind::LoginFailed,
            Self::PushFailed { .. } => ErrorKind::PushFailed,
            Self::ConfigError(_) => ErrorKind::ConfigError,
        }
    }
}

/// Result type alias for checkpoint pipeline operations
pub type Result<T> = std::result::Result<T, CheckpointError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_unavailable_display() {
        let error = CheckpointError::RuntimeUnavailable {
            operation: "list containers".to_string(),
            namespace: "k8s.io".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Container runtime unavailable: list containers in namespace k8s.io - connection refused"
        );
    }

    #[test]
    fn test_not_found_display() {
        let error = CheckpointError::NotFound {
            pod: "zzz".to_string(),
            namespace: "k8s.io".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Container not found for pod zzz in namespace k8s.io"
        );
    }

    #[test]
    fn test_checkpoint_failed_carries_output() {
        let error = CheckpointError::CheckpointFailed {
            container: "ctr-1".to_string(),
            message: "exit status 1".to_string(),
            output: "oom".to_string(),
        };
        let msg = error.to_string();
        assert!(msg.contains("ctr-1"));
        assert!(msg.contains("oom"));
    }

    #[test]
    fn test_timeout_display() {
        let error = CheckpointError::Timeout {
            operation: "checkpoint".to_string(),
            container: "ctr-1".to_string(),
            limit: Duration::from_secs(30),
        };
        assert_eq!(
            error.to_string(),
            "Timeout: checkpoint for container ctr-1 exceeded 30s"
        );
    }

    #[test]
    fn test_packaging_failed_names_step() {
        let error = CheckpointError::PackagingFailed {
            step: PackagingStep::Copy,
            image: "registry/example:checkpoint-ctr-9".to_string(),
            message: "no space left on device".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Packaging failed at copy for image registry/example:checkpoint-ctr-9: no space left on device"
        );
    }

    #[test]
    fn test_packaging_step_display() {
        assert_eq!(PackagingStep::FromScratch.to_string(), "from-scratch");
        assert_eq!(PackagingStep::Copy.to_string(), "copy");
        assert_eq!(PackagingStep::Commit.to_string(), "commit");
    }

    #[test]
    fn test_registry_errors_display() {
        let error = CheckpointError::CredentialError {
            region: "us-east-1".to_string(),
            message: "no authorization data returned".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Registry credential error in region us-east-1: no authorization data returned"
        );

        let error = CheckpointError::LoginFailed {
            endpoint: "https://123.dkr.ecr.us-east-1.amazonaws.com".to_string(),
            message: "unauthorized".to_string(),
        };
        assert!(error.to_string().starts_with("Registry login failed for https://"));

        let error = CheckpointError::PushFailed {
            image: "registry/example:checkpoint-ctr-9".to_string(),
            message: "denied".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Push failed for image registry/example:checkpoint-ctr-9: denied"
        );
    }

    #[test]
    fn test_kind_classification() {
        let cases = vec![
            (
                CheckpointError::NotFound {
                    pod: "p".to_string(),
                    namespace: "n".to_string(),
                },
                ErrorKind::NotFound,
            ),
            (
                CheckpointError::CredentialError {
                    region: "r".to_string(),
                    message: "m".to_string(),
                },
                ErrorKind::CredentialError,
            ),
            (
                CheckpointError::ConfigError("bad".to_string()),
                ErrorKind::ConfigError,
            ),
        ];
        for (error, kind) in cases {
            assert_eq!(error.kind(), kind);
        }
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::NotFound.to_string(), "NotFound");
        assert_eq!(ErrorKind::CheckpointFailed.to_string(), "CheckpointFailed");
        assert_eq!(ErrorKind::PushFailed.to_string(), "PushFailed");
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(CheckpointError::ConfigError("test error".to_string()))
        }

        assert_eq!(returns_ok().unwrap(), 42);
        assert!(returns_err().is_err());
    }
}
