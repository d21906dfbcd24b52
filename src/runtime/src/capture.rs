//! Checkpoint capture.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pod_checkpoint_core::event::{events, EventEmitter, PipelineEvent};
use pod_checkpoint_core::{CheckpointArtifact, CheckpointError, ContainerHandle, Result};

use crate::containerd::CheckpointEngine;

/// Invokes the runtime checkpoint facility for a resolved container.
pub struct CheckpointCapturer {
    engine: Arc<dyn CheckpointEngine>,
    namespace: String,
    root: PathBuf,
    timeout: Option<Duration>,
    events: EventEmitter,
}

impl CheckpointCapturer {
    pub fn new(
        engine: Arc<dyn CheckpointEngine>,
        namespace: impl Into<String>,
        root: impl Into<PathBuf>,
        events: EventEmitter,
    ) -> Self {
        Self {
            engine,
            namespace: namespace.into(),
            root: root.into(),
            timeout: None,
            events,
        }
    }

    /// Bound the checkpoint call. `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Artifact location for `container`.
    pub fn artifact_path(&self, container: &ContainerHandle) -> PathBuf {
        CheckpointArtifact::path_for(&self.root, container)
    }

    /// Checkpoint `container` to its artifact path.
    ///
    /// Does not remove the path on failure; the caller owns the artifact.
    pub async fn capture(&self, container: &ContainerHandle) -> Result<CheckpointArtifact> {
        let path = self.artifact_path(container);
        tracing::info!(container = %container, path = %path.display(), "Creating checkpoint");

        let call = self.engine.checkpoint(&self.namespace, container, &path);
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                CheckpointError::Timeout {
                    operation: "checkpoint".to_string(),
                    container: container.to_string(),
                    limit,
                }
            })?,
            None => call.await,
        };

        let output = result.map_err(|e| CheckpointError::CheckpointFailed {
            container: container.to_string(),
            message: e.to_string(),
            output: String::new(),
        })?;

        if !output.success() {
            return Err(CheckpointError::CheckpointFailed {
                container: container.to_string(),
                message: output.status_description(),
                output: output.combined(),
            });
        }

        tracing::info!(container = %container, path = %path.display(), "Checkpoint created");
        self.events.emit(PipelineEvent::with_string(
            events::CHECKPOINT_CREATED,
            path.display().to_string(),
        ));

        Ok(CheckpointArtifact::new(path))
    }
}
