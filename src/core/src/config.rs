use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CheckpointError, Result};

/// Prefix shared by every environment override.
const ENV_PREFIX: &str = "POD_CHECKPOINT_";

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// containerd socket used by `ctr`
    pub containerd_address: PathBuf,

    /// containerd namespace holding pod-managed containers
    pub namespace: String,

    /// Container label carrying the owning pod's identifier
    pub pod_label: String,

    /// Directory under which `checkpoint-<container>` artifacts are written
    pub checkpoint_root: PathBuf,

    /// Upper bound on checkpoint capture in seconds (None = wait indefinitely)
    pub checkpoint_timeout_secs: Option<u64>,

    /// External tool binaries
    pub tools: ToolPaths,

    /// Username paired with token-based registry credentials
    pub registry_username: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            containerd_address: PathBuf::from("/run/containerd/containerd.sock"),
            namespace: "k8s.io".to_string(),
            pod_label: "io.kubernetes.pod.uid".to_string(),
            checkpoint_root: std::env::temp_dir(),
            checkpoint_timeout_secs: None,
            tools: ToolPaths::default(),
            registry_username: "AWS".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Create configuration from defaults overlaid with `POD_CHECKPOINT_*`
    /// environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// Keys are passed with the `POD_CHECKPOINT_` prefix already applied.
    /// Empty values are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();

        if let Some(v) = get("CONTAINERD_ADDRESS") {
            config.containerd_address = PathBuf::from(v);
        }
        if let Some(v) = get("NAMESPACE") {
            config.namespace = v;
        }
        if let Some(v) = get("POD_LABEL") {
            config.pod_label = v;
        }
        if let Some(v) = get("DIR") {
            config.checkpoint_root = PathBuf::from(v);
        }
        if let Some(v) = get("TIMEOUT_SECS") {
            let secs: u64 = v.parse().map_err(|_| {
                CheckpointError::ConfigError(format!(
                    "{ENV_PREFIX}TIMEOUT_SECS must be a whole number of seconds, got '{v}'"
                ))
            })?;
            config.checkpoint_timeout_secs = if secs == 0 { None } else { Some(secs) };
        }
        if let Some(v) = get("REGISTRY_USER") {
            config.registry_username = v;
        }
        if let Some(v) = get("CTR") {
            config.tools.ctr = PathBuf::from(v);
        }
        if let Some(v) = get("BUILDAH") {
            config.tools.buildah = PathBuf::from(v);
        }
        if let Some(v) = get("PODMAN") {
            config.tools.podman = PathBuf::from(v);
        }
        if let Some(v) = get("AWS") {
            config.tools.aws = PathBuf::from(v);
        }

        Ok(config)
    }

    /// Checkpoint capture bound, if any.
    pub fn checkpoint_timeout(&self) -> Option<Duration> {
        self.checkpoint_timeout_secs.map(Duration::from_secs)
    }
}

/// Locations of the external tools the pipeline drives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolPaths {
    /// containerd client (inventory and checkpoint)
    pub ctr: PathBuf,

    /// Image build engine
    pub buildah: PathBuf,

    /// Image push agent
    pub podman: PathBuf,

    /// Cloud provider CLI (registry credentials)
    pub aws: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ctr: PathBuf::from("ctr"),
            buildah: PathBuf::from("buildah"),
            podman: PathBuf::from("podman"),
            aws: PathBuf::from("aws"),
        }
    }
}
