//! Pod to container resolution.

use std::collections::HashMap;
use std::sync::Arc;

use pod_checkpoint_core::event::{events, EventEmitter, PipelineEvent};
use pod_checkpoint_core::{CheckpointError, ContainerHandle, PodIdentifier, Result};

use crate::containerd::ContainerInventory;

/// Maps a pod identifier to the first container whose pod label contains it.
pub struct ContainerResolver {
    inventory: Arc<dyn ContainerInventory>,
    namespace: String,
    pod_label: String,
    events: EventEmitter,
}

impl ContainerResolver {
    pub fn new(
        inventory: Arc<dyn ContainerInventory>,
        namespace: impl Into<String>,
        pod_label: impl Into<String>,
        events: EventEmitter,
    ) -> Self {
        Self {
            inventory,
            namespace: namespace.into(),
            pod_label: pod_label.into(),
            events,
        }
    }

    /// Resolve `pod` to a container handle.
    ///
    /// Containers are visited in inventory order and the first match wins.
    /// A failing label read skips that container.
    pub async fn resolve(&self, pod: &PodIdentifier) -> Result<ContainerHandle> {
        tracing::info!(pod = %pod, namespace = %self.namespace, "Searching for container");

        let ids = self
            .inventory
            .list_containers(&self.namespace)
            .await
            .map_err(|e| CheckpointError::RuntimeUnavailable {
                operation: "list containers".to_string(),
                namespace: self.namespace.clone(),
                message: e.to_string(),
            })?;

        for id in ids {
            let labels = match self.inventory.container_labels(&self.namespace, &id).await {
                Ok(labels) => labels,
                Err(e) => {
                    tracing::debug!(container = %id, error = %e, "Skipping container");
                    continue;
                }
            };

            if label_matches(&labels, &self.pod_label, pod) {
                let handle = ContainerHandle::new(id);
                tracing::info!(pod = %pod, container = %handle, "Found container");
                self.events.emit(PipelineEvent::with_string(
                    events::CONTAINER_RESOLVED,
                    handle.id(),
                ));
                return Ok(handle);
            }
        }

        Err(CheckpointError::NotFound {
            pod: pod.to_string(),
            namespace: self.namespace.clone(),
        })
    }
}

/// Substring match of the pod identifier against the pod-ownership label.
///
/// A missing label reads as empty, so only an empty identifier matches it.
fn label_matches(labels: &HashMap<String, String>, label: &str, pod: &PodIdentifier) -> bool {
    labels
        .get(label)
        .map(String::as_str)
        .unwrap_or("")
        .contains(pod.as_str())
}
