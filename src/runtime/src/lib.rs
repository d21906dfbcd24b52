//! Pod Checkpoint Runtime - pipeline engine.
//!
//! Resolves a pod to one of its containers, checkpoints it through the
//! container runtime, packages the checkpoint as a scratch image and pushes
//! that image to a token-authenticated registry.

#![allow(clippy::result_large_err)]

pub mod buildah;
pub mod capture;
pub mod containerd;
pub mod exec;
pub mod mock;
pub mod package;
pub mod pipeline;
pub mod publish;
pub mod registry;
pub mod resolver;

// Re-export common types
pub use buildah::{BuildahBuilder, ImageBuilder};
pub use capture::CheckpointCapturer;
pub use containerd::{CheckpointEngine, ContainerInventory, CtrClient};
pub use exec::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner, ToolError};
pub use package::ImagePackager;
pub use pipeline::{ArtifactGuard, CheckpointPipeline, Collaborators, Observability, PipelineReport};
pub use publish::{PublishState, RegistryPublisher};
pub use registry::{AwsEcrProvider, CredentialProvider, PodmanPusher, RegistryPusher};
pub use resolver::ContainerResolver;

/// Pod checkpoint runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
