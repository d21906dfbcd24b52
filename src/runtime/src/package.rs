//! Checkpoint to image packaging.
//!
//! Three dependent build-engine steps: scratch context, copy, commit.
//! Intermediate build-engine state is left to the engine on failure.

use std::sync::Arc;

use pod_checkpoint_core::event::{events, EventEmitter, PipelineEvent};
use pod_checkpoint_core::{
    CheckpointArtifact, CheckpointError, ContainerHandle, PackagedImage, PackagingStep, Result,
};

use crate::buildah::ImageBuilder;
use crate::exec::CommandOutput;

/// Destination of the checkpoint tree inside the image.
const IMAGE_ROOT: &str = "/";

/// Wraps a checkpoint artifact into a scratch-based image.
pub struct ImagePackager {
    builder: Arc<dyn ImageBuilder>,
    events: EventEmitter,
}

impl ImagePackager {
    pub fn new(builder: Arc<dyn ImageBuilder>, events: EventEmitter) -> Self {
        Self { builder, events }
    }

    /// Package `artifact` as `<repository>:checkpoint-<container>`.
    pub async fn package(
        &self,
        artifact: &CheckpointArtifact,
        repository: &str,
        container: &ContainerHandle,
    ) -> Result<PackagedImage> {
        let image = PackagedImage::for_container(repository, container);
        tracing::info!(container = %container, image = %image, "Converting checkpoint to image");

        let output = require_success(
            &image,
            PackagingStep::FromScratch,
            self.builder.from_scratch().await,
        )?;
        let context = output.stdout.trim().to_string();
        if context.is_empty() {
            return Err(CheckpointError::PackagingFailed {
                step: PackagingStep::FromScratch,
                image: image.to_string(),
                message: "build engine returned no working container".to_string(),
            });
        }
        tracing::debug!(context = %context, "Build context created");

        require_success(
            &image,
            PackagingStep::Copy,
            self.builder.copy(&context, artifact.path(), IMAGE_ROOT).await,
        )?;

        require_success(
            &image,
            PackagingStep::Commit,
            self.builder.commit(&context, image.reference()).await,
        )?;

        tracing::info!(image = %image, "Created image");
        self.events.emit(PipelineEvent::with_string(
            events::IMAGE_COMMITTED,
            image.reference(),
        ));

        Ok(image)
    }
}

/// Require a successful build-engine step.
fn require_success(
    image: &PackagedImage,
    step: PackagingStep,
    result: std::io::Result<CommandOutput>,
) -> Result<CommandOutput> {
    let failed = |message: String| CheckpointError::PackagingFailed {
        step,
        image: image.to_string(),
        message,
    };

    let output = result.map_err(|e| failed(e.to_string()))?;
    if !output.success() {
        let detail = output.combined();
        let message = if detail.is_empty() {
            output.status_description()
        } else {
            format!("{}: {}", output.status_description(), detail)
        };
        return Err(failed(message));
    }
    Ok(output)
}
