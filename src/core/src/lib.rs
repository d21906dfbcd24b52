//! Pod Checkpoint Core - Foundational Types
//!
//! This crate provides the error taxonomy, configuration, pipeline events
//! and transient data model shared by the checkpoint pipeline and its CLI.

pub mod config;
pub mod error;
pub mod event;
pub mod model;

// Re-export commonly used types
pub use config::{PipelineConfig, ToolPaths};
pub use error::{CheckpointError, ErrorKind, PackagingStep, Result};
pub use event::{EventEmitter, EventPayload, PipelineEvent};
pub use model::{
    AuthorizationData, CheckpointArtifact, ContainerHandle, PackagedImage, PodIdentifier,
    RegistryCredential,
};

/// Pod checkpoint version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
