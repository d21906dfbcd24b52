//! Image push agent driven through `podman`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use pod_checkpoint_core::RegistryCredential;

use crate::exec::{CommandOutput, CommandRunner, CommandSpec};

/// Local image-push agent.
///
/// Both calls take the auth store to use; the caller owns its lifetime.
#[async_trait]
pub trait RegistryPusher: Send + Sync {
    /// Authenticate the agent to the credential's registry endpoint,
    /// recording the login in `auth_file` only.
    async fn login(
        &self,
        credential: &RegistryCredential,
        auth_file: &Path,
    ) -> std::io::Result<CommandOutput>;

    /// Push a locally committed image reference using the login in `auth_file`.
    async fn push(&self, reference: &str, auth_file: &Path) -> std::io::Result<CommandOutput>;
}

/// `podman` CLI push agent.
///
/// The login secret is written to the child's stdin (`--password-stdin`)
/// so it never shows up in the process table or in logged command lines.
/// `--authfile` keeps it out of podman's default auth store.
pub struct PodmanPusher {
    runner: Arc<dyn CommandRunner>,
    binary: PathBuf,
}

impl PodmanPusher {
    pub fn new(runner: Arc<dyn CommandRunner>, binary: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            binary: binary.into(),
        }
    }

    fn command(&self, subcommand: &str, auth_file: &Path) -> CommandSpec {
        CommandSpec::new(&self.binary)
            .arg(subcommand)
            .arg("--authfile")
            .arg(auth_file.to_string_lossy())
    }
}

#[async_trait]
impl RegistryPusher for PodmanPusher {
    async fn login(
        &self,
        credential: &RegistryCredential,
        auth_file: &Path,
    ) -> std::io::Result<CommandOutput> {
        let spec = self
            .command("login", auth_file)
            .args([
                "--username",
                credential.username(),
                "--password-stdin",
                credential.endpoint(),
            ])
            .stdin(credential.secret());
        self.runner.run(&spec).await
    }

    async fn push(&self, reference: &str, auth_file: &Path) -> std::io::Result<CommandOutput> {
        let spec = self.command("push", auth_file).arg(reference);
        self.runner.run(&spec).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedRunner;

    const AUTH_FILE: &str = "/tmp/pod-checkpoint-auth-x/auth.json";

    #[tokio::test]
    async fn test_login_passes_secret_on_stdin() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_ok("Login Succeeded!\n");

        let pusher = PodmanPusher::new(runner.clone(), "podman");
        let credential = RegistryCredential::new("AWS", "s3cr3t", "https://registry.example");
        let output = pusher
            .login(&credential, Path::new(AUTH_FILE))
            .await
            .unwrap();
        assert!(output.success());

        let calls = runner.calls();
        assert_eq!(
            calls[0].to_string(),
            format!(
                "podman login --authfile {AUTH_FILE} --username AWS --password-stdin https://registry.example"
            )
        );
        assert!(!calls[0].args.iter().any(|a| a.contains("s3cr3t")));
        assert_eq!(calls[0].stdin.as_deref(), Some("s3cr3t"));
    }

    #[tokio::test]
    async fn test_push_uses_same_auth_file() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_ok("");

        let pusher = PodmanPusher::new(runner.clone(), "podman");
        pusher
            .push("registry/example:checkpoint-ctr-9", Path::new(AUTH_FILE))
            .await
            .unwrap();

        assert_eq!(
            runner.calls()[0].to_string(),
            format!("podman push --authfile {AUTH_FILE} registry/example:checkpoint-ctr-9")
        );
    }
}
