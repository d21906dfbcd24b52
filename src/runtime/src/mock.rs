//! In-memory collaborators for testing and dry runs.
//!
//! Each mock records the calls it receives so tests can assert on ordering
//! and on what was (or was not) attempted.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pod_checkpoint_core::{AuthorizationData, ContainerHandle, PackagingStep, RegistryCredential};

use crate::buildah::ImageBuilder;
use crate::containerd::{CheckpointEngine, ContainerInventory};
use crate::exec::{CommandOutput, CommandRunner, CommandSpec, ToolError};
use crate::registry::{CredentialProvider, RegistryPusher};

/// Command runner that replays queued responses.
///
/// Runs past the end of the script return an `io::Error`.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: Mutex<VecDeque<std::io::Result<CommandOutput>>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: std::io::Result<CommandOutput>) {
        self.responses.lock().push_back(response);
    }

    pub fn push_ok(&self, stdout: &str) {
        self.push(Ok(CommandOutput::ok(stdout)));
    }

    pub fn push_failed(&self, code: i32, stderr: &str) {
        self.push(Ok(CommandOutput::failed(code, stderr)));
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> std::io::Result<CommandOutput> {
        self.calls.lock().push(spec.clone());
        self.responses.lock().pop_front().unwrap_or_else(|| {
            Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("no scripted response for {}", spec),
            ))
        })
    }
}

/// Container inventory backed by a fixed, ordered list.
#[derive(Default)]
pub struct MockInventory {
    containers: Vec<(String, HashMap<String, String>)>,
    unreadable: HashSet<String>,
    list_error: Option<String>,
    label_reads: Mutex<Vec<String>>,
}

impl MockInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a container carrying a single label.
    pub fn with_container(mut self, id: &str, label: &str, value: &str) -> Self {
        let mut labels = HashMap::new();
        labels.insert(label.to_string(), value.to_string());
        self.containers.push((id.to_string(), labels));
        self
    }

    /// Add a container carrying no labels at all.
    pub fn with_unlabelled(mut self, id: &str) -> Self {
        self.containers.push((id.to_string(), HashMap::new()));
        self
    }

    /// Add a container whose label read fails.
    pub fn with_unreadable(mut self, id: &str) -> Self {
        self.containers.push((id.to_string(), HashMap::new()));
        self.unreadable.insert(id.to_string());
        self
    }

    /// Make the listing call itself fail.
    pub fn with_list_error(mut self, message: &str) -> Self {
        self.list_error = Some(message.to_string());
        self
    }

    /// IDs whose labels were read, in order.
    pub fn label_reads(&self) -> Vec<String> {
        self.label_reads.lock().clone()
    }
}

#[async_trait]
impl ContainerInventory for MockInventory {
    async fn list_containers(&self, _namespace: &str) -> Result<Vec<String>, ToolError> {
        if let Some(ref message) = self.list_error {
            return Err(ToolError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                message.clone(),
            )));
        }
        Ok(self.containers.iter().map(|(id, _)| id.clone()).collect())
    }

    async fn container_labels(
        &self,
        _namespace: &str,
        id: &str,
    ) -> Result<HashMap<String, String>, ToolError> {
        self.label_reads.lock().push(id.to_string());
        if self.unreadable.contains(id) {
            return Err(ToolError::Parse {
                command: format!("containers info {}", id),
                message: "container metadata unavailable".to_string(),
            });
        }
        self.containers
            .iter()
            .find(|(cid, _)| cid == id)
            .map(|(_, labels)| labels.clone())
            .ok_or_else(|| ToolError::Parse {
                command: format!("containers info {}", id),
                message: "no such container".to_string(),
            })
    }
}

/// Checkpoint engine that writes a small artifact tree and returns a fixed output.
pub struct MockCheckpointEngine {
    output: CommandOutput,
    write_artifact: bool,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, PathBuf)>>,
}

impl MockCheckpointEngine {
    /// Engine that succeeds and writes the artifact.
    pub fn succeeding() -> Self {
        Self {
            output: CommandOutput::ok(""),
            write_artifact: true,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Engine that exits with `code`; `partial` controls whether a
    /// half-written artifact is left behind.
    pub fn failing(code: i32, output: &str, partial: bool) -> Self {
        Self {
            output: CommandOutput::failed(code, output),
            write_artifact: partial,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sleep for `delay` after writing the artifact and before returning.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `(container, dest)` of every checkpoint call.
    pub fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CheckpointEngine for MockCheckpointEngine {
    async fn checkpoint(
        &self,
        _namespace: &str,
        container: &ContainerHandle,
        dest: &Path,
    ) -> std::io::Result<CommandOutput> {
        self.calls
            .lock()
            .push((container.id().to_string(), dest.to_path_buf()));

        if self.write_artifact {
            tokio::fs::create_dir_all(dest).await?;
            tokio::fs::write(dest.join("config.dump"), container.id()).await?;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.output.clone())
    }
}

/// Build engine that records operations and can fail at one step.
#[derive(Default)]
pub struct MockImageBuilder {
    fail_at: Option<PackagingStep>,
    operations: Mutex<Vec<String>>,
}

impl MockImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(step: PackagingStep) -> Self {
        Self {
            fail_at: Some(step),
            operations: Mutex::new(Vec::new()),
        }
    }

    /// Recorded operations (`from scratch`, `copy <ctx> <src> <dest>`, `commit <ctx> <ref>`).
    pub fn operations(&self) -> Vec<String> {
        self.operations.lock().clone()
    }

    /// References committed so far.
    pub fn committed(&self) -> Vec<String> {
        self.operations()
            .iter()
            .filter_map(|op| op.strip_prefix("commit "))
            .filter_map(|rest| rest.split_once(' ').map(|(_, r)| r.to_string()))
            .collect()
    }

    fn respond(&self, step: PackagingStep, stdout: &str) -> CommandOutput {
        if self.fail_at == Some(step) {
            CommandOutput::failed(125, format!("{} failed", step))
        } else {
            CommandOutput::ok(stdout)
        }
    }
}

#[async_trait]
impl ImageBuilder for MockImageBuilder {
    async fn from_scratch(&self) -> std::io::Result<CommandOutput> {
        self.operations.lock().push("from scratch".to_string());
        Ok(self.respond(PackagingStep::FromScratch, "working-container\n"))
    }

    async fn copy(
        &self,
        context: &str,
        source: &Path,
        dest: &str,
    ) -> std::io::Result<CommandOutput> {
        self.operations
            .lock()
            .push(format!("copy {} {} {}", context, source.display(), dest));
        Ok(self.respond(PackagingStep::Copy, ""))
    }

    async fn commit(&self, context: &str, reference: &str) -> std::io::Result<CommandOutput> {
        self.operations
            .lock()
            .push(format!("commit {} {}", context, reference));
        Ok(self.respond(PackagingStep::Commit, "sha256:0000\n"))
    }
}

/// Credential provider returning a fixed authorization list or error.
#[derive(Default)]
pub struct MockCredentialProvider {
    entries: Vec<AuthorizationData>,
    error: Option<String>,
    regions: Mutex<Vec<String>>,
}

impl MockCredentialProvider {
    pub fn new(entries: Vec<AuthorizationData>) -> Self {
        Self {
            entries,
            ..Default::default()
        }
    }

    /// One entry for `endpoint` whose token decodes to `AWS:<password>`.
    pub fn single(endpoint: &str, token: &str) -> Self {
        Self::new(vec![AuthorizationData {
            token: token.to_string(),
            endpoint: endpoint.to_string(),
        }])
    }

    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// Regions requested so far.
    pub fn regions(&self) -> Vec<String> {
        self.regions.lock().clone()
    }
}

#[async_trait]
impl CredentialProvider for MockCredentialProvider {
    async fn authorization(&self, region: &str) -> Result<Vec<AuthorizationData>, ToolError> {
        self.regions.lock().push(region.to_string());
        match self.error {
            Some(ref message) => Err(ToolError::Failed {
                command: "get-authorization-token".to_string(),
                status: "exit status 255".to_string(),
                output: message.clone(),
            }),
            None => Ok(self.entries.clone()),
        }
    }
}

/// Push agent that records logins and pushes.
///
/// A successful login writes the auth file like podman does, so tests can
/// check it does not outlive the publish.
#[derive(Default)]
pub struct MockRegistryPusher {
    fail_login: bool,
    fail_push: bool,
    logins: Mutex<Vec<(String, String)>>,
    pushes: Mutex<Vec<String>>,
    auth_files: Mutex<Vec<PathBuf>>,
}

impl MockRegistryPusher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_login() -> Self {
        Self {
            fail_login: true,
            ..Default::default()
        }
    }

    pub fn failing_push() -> Self {
        Self {
            fail_push: true,
            ..Default::default()
        }
    }

    /// `(endpoint, username)` of every login.
    pub fn logins(&self) -> Vec<(String, String)> {
        self.logins.lock().clone()
    }

    /// References pushed so far.
    pub fn pushes(&self) -> Vec<String> {
        self.pushes.lock().clone()
    }

    /// Auth file passed to every login and push, in call order.
    pub fn auth_files(&self) -> Vec<PathBuf> {
        self.auth_files.lock().clone()
    }
}

#[async_trait]
impl RegistryPusher for MockRegistryPusher {
    async fn login(
        &self,
        credential: &RegistryCredential,
        auth_file: &Path,
    ) -> std::io::Result<CommandOutput> {
        self.logins.lock().push((
            credential.endpoint().to_string(),
            credential.username().to_string(),
        ));
        self.auth_files.lock().push(auth_file.to_path_buf());
        if self.fail_login {
            return Ok(CommandOutput::failed(125, "unauthorized: authentication required"));
        }
        let mut auths = serde_json::Map::new();
        auths.insert(
            credential.endpoint().to_string(),
            serde_json::json!({ "auth": credential.secret() }),
        );
        let store = serde_json::json!({ "auths": auths });
        tokio::fs::write(auth_file, store.to_string()).await?;
        Ok(CommandOutput::ok("Login Succeeded!\n"))
    }

    async fn push(&self, reference: &str, auth_file: &Path) -> std::io::Result<CommandOutput> {
        self.pushes.lock().push(reference.to_string());
        self.auth_files.lock().push(auth_file.to_path_buf());
        if self.fail_push {
            return Ok(CommandOutput::failed(125, "denied: repository does not exist"));
        }
        Ok(CommandOutput::ok(""))
    }
}
