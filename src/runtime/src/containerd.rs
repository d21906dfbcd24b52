//! containerd collaborators driven through the `ctr` client.
//!
//! - [`ContainerInventory`]: namespace-scoped container listing and label reads
//! - [`CheckpointEngine`]: the runtime's task checkpoint facility

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use pod_checkpoint_core::ContainerHandle;
use serde::Deserialize;

use crate::exec::{run_checked, CommandOutput, CommandRunner, CommandSpec, ToolError};

/// Container inventory of the runtime.
#[async_trait]
pub trait ContainerInventory: Send + Sync {
    /// List container IDs in `namespace`, in the order the runtime returns them.
    async fn list_containers(&self, namespace: &str) -> Result<Vec<String>, ToolError>;

    /// Read the label metadata of one container.
    async fn container_labels(
        &self,
        namespace: &str,
        id: &str,
    ) -> Result<HashMap<String, String>, ToolError>;
}

/// Runtime checkpoint facility.
#[async_trait]
pub trait CheckpointEngine: Send + Sync {
    /// Checkpoint `container` into `dest`, returning the tool's output and status.
    async fn checkpoint(
        &self,
        namespace: &str,
        container: &ContainerHandle,
        dest: &Path,
    ) -> std::io::Result<CommandOutput>;
}

/// Subset of `ctr containers info` output.
#[derive(Debug, Deserialize)]
struct CtrContainerInfo {
    #[serde(rename = "Labels", default)]
    labels: Option<HashMap<String, String>>,
}

/// `ctr` client bound to one containerd socket.
pub struct CtrClient {
    runner: Arc<dyn CommandRunner>,
    binary: PathBuf,
    address: PathBuf,
}

impl CtrClient {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        binary: impl Into<PathBuf>,
        address: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            binary: binary.into(),
            address: address.into(),
        }
    }

    /// `ctr --address <sock> -n <namespace> <args...>`
    fn command(&self, namespace: &str) -> CommandSpec {
        CommandSpec::new(&self.binary)
            .arg("--address")
            .arg(self.address.to_string_lossy())
            .args(["-n", namespace])
    }
}

#[async_trait]
impl ContainerInventory for CtrClient {
    async fn list_containers(&self, namespace: &str) -> Result<Vec<String>, ToolError> {
        let spec = self.command(namespace).args(["containers", "list", "--quiet"]);
        let output = run_checked(self.runner.as_ref(), &spec).await?;

        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    async fn container_labels(
        &self,
        namespace: &str,
        id: &str,
    ) -> Result<HashMap<String, String>, ToolError> {
        let spec = self.command(namespace).args(["containers", "info", id]);
        let output = run_checked(self.runner.as_ref(), &spec).await?;

        let info: CtrContainerInfo =
            serde_json::from_str(&output.stdout).map_err(|e| ToolError::Parse {
                command: spec.to_string(),
                message: e.to_string(),
            })?;

        Ok(info.labels.unwrap_or_default())
    }
}

#[async_trait]
impl CheckpointEngine for CtrClient {
    async fn checkpoint(
        &self,
        namespace: &str,
        container: &ContainerHandle,
        dest: &Path,
    ) -> std::io::Result<CommandOutput> {
        let spec = self.command(namespace).args([
            "tasks".to_string(),
            "checkpoint".to_string(),
            container.id().to_string(),
            "--checkpoint-path".to_string(),
            dest.to_string_lossy().to_string(),
        ]);
        self.runner.run(&spec).await
    }
}
