//! Checkpoint pipeline orchestration.
//!
//! Runs resolve, capture, package and publish strictly in sequence. The
//! on-disk artifact is removed on every exit path once capture has been
//! attempted, success or failure.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, Instrument};

use pod_checkpoint_core::event::{events, EventEmitter, PipelineEvent};
use pod_checkpoint_core::{
    CheckpointError, ContainerHandle, PackagedImage, PipelineConfig, PodIdentifier, Result,
};

use crate::buildah::{BuildahBuilder, ImageBuilder};
use crate::capture::CheckpointCapturer;
use crate::containerd::{CheckpointEngine, ContainerInventory, CtrClient};
use crate::exec::{CommandRunner, ProcessRunner};
use crate::package::ImagePackager;
use crate::publish::RegistryPublisher;
use crate::registry::{AwsEcrProvider, CredentialProvider, PodmanPusher, RegistryPusher};
use crate::resolver::ContainerResolver;

/// External systems the pipeline drives.
#[derive(Clone)]
pub struct Collaborators {
    pub inventory: Arc<dyn ContainerInventory>,
    pub engine: Arc<dyn CheckpointEngine>,
    pub builder: Arc<dyn ImageBuilder>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub pusher: Arc<dyn RegistryPusher>,
}

impl Collaborators {
    /// Production collaborators: `ctr`, `buildah`, the AWS CLI and `podman`.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::with_runner(config, Arc::new(ProcessRunner))
    }

    /// Production tool clients sharing `runner`.
    pub fn with_runner(config: &PipelineConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let ctr = Arc::new(CtrClient::new(
            runner.clone(),
            &config.tools.ctr,
            &config.containerd_address,
        ));
        Self {
            inventory: ctr.clone(),
            engine: ctr,
            builder: Arc::new(BuildahBuilder::new(runner.clone(), &config.tools.buildah)),
            credentials: Arc::new(AwsEcrProvider::new(runner.clone(), &config.tools.aws)),
            pusher: Arc::new(PodmanPusher::new(runner, &config.tools.podman)),
        }
    }
}

/// Where diagnostics and progress events go.
///
/// The dispatch is scoped to [`CheckpointPipeline::run`]; nothing is
/// installed process-wide.
#[derive(Clone)]
pub struct Observability {
    pub events: EventEmitter,
    pub dispatch: Dispatch,
}

impl Observability {
    pub fn new(dispatch: Dispatch) -> Self {
        Self {
            events: EventEmitter::default(),
            dispatch,
        }
    }
}

impl Default for Observability {
    fn default() -> Self {
        Self::new(Dispatch::none())
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub container: ContainerHandle,
    pub image: PackagedImage,
    pub elapsed: Duration,
}

/// Resolve, checkpoint, package and publish one pod's container.
pub struct CheckpointPipeline {
    resolver: ContainerResolver,
    capturer: CheckpointCapturer,
    packager: ImagePackager,
    publisher: RegistryPublisher,
    observability: Observability,
}

impl CheckpointPipeline {
    pub fn new(
        config: &PipelineConfig,
        collaborators: Collaborators,
        observability: Observability,
    ) -> Self {
        let events = observability.events.clone();
        Self {
            resolver: ContainerResolver::new(
                collaborators.inventory,
                &config.namespace,
                &config.pod_label,
                events.clone(),
            ),
            capturer: CheckpointCapturer::new(
                collaborators.engine,
                &config.namespace,
                &config.checkpoint_root,
                events.clone(),
            )
            .with_timeout(config.checkpoint_timeout()),
            packager: ImagePackager::new(collaborators.builder, events.clone()),
            publisher: RegistryPublisher::new(
                collaborators.credentials,
                collaborators.pusher,
                &config.registry_username,
                events,
            ),
            observability,
        }
    }

    /// Subscribe to progress events for subsequent runs.
    pub fn events(&self) -> &EventEmitter {
        &self.observability.events
    }

    /// Run the full pipeline for `pod`, pushing to `repository` in `region`.
    pub async fn run(
        &self,
        pod: &PodIdentifier,
        repository: &str,
        region: &str,
    ) -> Result<PipelineReport> {
        let work = async {
            let span = tracing::info_span!("checkpoint", pod = %pod, repository = %repository);
            self.run_stages(pod, repository, region).instrument(span).await
        };
        work.with_subscriber(self.observability.dispatch.clone())
            .await
    }

    async fn run_stages(
        &self,
        pod: &PodIdentifier,
        repository: &str,
        region: &str,
    ) -> Result<PipelineReport> {
        let started = Instant::now();
        let emitter = &self.observability.events;
        emitter.emit(PipelineEvent::with_string(
            events::PIPELINE_STARTED,
            pod.as_str(),
        ));

        match self.execute(pod, repository, region).await {
            Ok((container, image)) => {
                let report = PipelineReport {
                    container,
                    image,
                    elapsed: started.elapsed(),
                };
                tracing::info!(
                    container = %report.container,
                    image = %report.image,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Checkpoint pipeline completed"
                );
                emitter.emit(PipelineEvent::from(&report));
                Ok(report)
            }
            Err(e) => {
                tracing::error!(
                    stage = failed_stage(&e),
                    kind = %e.kind(),
                    error = %e,
                    "Checkpoint pipeline failed"
                );
                emitter.emit(PipelineEvent::with_string(
                    events::PIPELINE_FAILED,
                    e.to_string(),
                ));
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        pod: &PodIdentifier,
        repository: &str,
        region: &str,
    ) -> Result<(ContainerHandle, PackagedImage)> {
        let container = self.resolver.resolve(pod).await?;

        // Armed before capture so partial artifacts are removed too.
        let guard = ArtifactGuard::new(
            self.capturer.artifact_path(&container),
            self.observability.events.clone(),
        );

        let artifact = self.capturer.capture(&container).await?;
        let image = self
            .packager
            .package(&artifact, repository, &container)
            .await?;
        self.publisher.publish(&image, region).await?;

        drop(guard);
        Ok((container, image))
    }
}

/// Removes a checkpoint artifact when dropped.
///
/// Removal failures are logged and never replace the pipeline's own result.
pub struct ArtifactGuard {
    path: PathBuf,
    events: EventEmitter,
}

impl ArtifactGuard {
    pub fn new(path: impl Into<PathBuf>, events: EventEmitter) -> Self {
        Self {
            path: path.into(),
            events,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        match remove_artifact(&self.path) {
            Ok(true) => {
                tracing::info!(path = %self.path.display(), "Removed checkpoint artifact");
                self.events.emit(PipelineEvent::with_string(
                    events::ARTIFACT_REMOVED,
                    self.path.display().to_string(),
                ));
            }
            Ok(false) => {
                tracing::debug!(path = %self.path.display(), "No checkpoint artifact to remove");
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove checkpoint artifact"
                );
                self.events.emit(PipelineEvent::with_string(
                    events::ARTIFACT_CLEANUP_FAILED,
                    self.path.display().to_string(),
                ));
            }
        }
    }
}

/// Returns whether anything was removed.
fn remove_artifact(path: &Path) -> std::io::Result<bool> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    let removed = if metadata.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };

    match removed {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

impl From<&PipelineReport> for PipelineEvent {
    fn from(report: &PipelineReport) -> Self {
        let mut map = std::collections::HashMap::new();
        map.insert(
            "container".to_string(),
            serde_json::Value::String(report.container.to_string()),
        );
        map.insert(
            "image".to_string(),
            serde_json::Value::String(report.image.to_string()),
        );
        map.insert(
            "elapsed_ms".to_string(),
            serde_json::Value::from(report.elapsed.as_millis() as u64),
        );
        PipelineEvent::with_map(events::PIPELINE_COMPLETED, map)
    }
}

/// Stage that produced `error`.
fn failed_stage(error: &CheckpointError) -> &'static str {
    match error {
        CheckpointError::RuntimeUnavailable { .. } | CheckpointError::NotFound { .. } => "resolve",
        CheckpointError::CheckpointFailed { .. } | CheckpointError::Timeout { .. } => "capture",
        CheckpointError::PackagingFailed { .. } => "package",
        CheckpointError::CredentialError { .. }
        | CheckpointError::LoginFailed { .. }
        | CheckpointError::PushFailed { .. } => "publish",
        CheckpointError::ConfigError(_) => "config",
    }
}
