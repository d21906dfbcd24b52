//! Image build engine driven through `buildah`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::exec::{CommandOutput, CommandRunner, CommandSpec};

/// Local image-build engine.
///
/// Each operation returns the tool's output and status; the caller decides
/// what a failure means.
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Instantiate an empty (scratch) build context. stdout carries its ID.
    async fn from_scratch(&self) -> std::io::Result<CommandOutput>;

    /// Copy `source` into the build context at `dest`.
    async fn copy(&self, context: &str, source: &Path, dest: &str)
        -> std::io::Result<CommandOutput>;

    /// Commit the build context as an image named `reference`.
    async fn commit(&self, context: &str, reference: &str) -> std::io::Result<CommandOutput>;
}

/// `buildah` CLI build engine.
pub struct BuildahBuilder {
    runner: Arc<dyn CommandRunner>,
    binary: PathBuf,
}

impl BuildahBuilder {
    pub fn new(runner: Arc<dyn CommandRunner>, binary: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl ImageBuilder for BuildahBuilder {
    async fn from_scratch(&self) -> std::io::Result<CommandOutput> {
        let spec = CommandSpec::new(&self.binary).args(["from", "scratch"]);
        self.runner.run(&spec).await
    }

    async fn copy(
        &self,
        context: &str,
        source: &Path,
        dest: &str,
    ) -> std::io::Result<CommandOutput> {
        let spec = CommandSpec::new(&self.binary).args([
            "copy".to_string(),
            context.to_string(),
            source.to_string_lossy().to_string(),
            dest.to_string(),
        ]);
        self.runner.run(&spec).await
    }

    async fn commit(&self, context: &str, reference: &str) -> std::io::Result<CommandOutput> {
        let spec = CommandSpec::new(&self.binary).args(["commit", context, reference]);
        self.runner.run(&spec).await
    }
}
