//! Command-line definition and execution.

use clap::Parser;
use tracing::Dispatch;

use pod_checkpoint_core::{PipelineConfig, PodIdentifier, Result};
use pod_checkpoint_runtime::{CheckpointPipeline, Collaborators, Observability, PipelineReport};

/// Checkpoint a running pod's container and push it to a registry as
/// `<ecr_repo>:checkpoint-<container-id>`.
///
/// Runtime, tool and socket locations are read from `POD_CHECKPOINT_*`
/// environment variables; log verbosity from `RUST_LOG`.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "pod-checkpoint", version, about)]
pub struct Cli {
    /// Pod identifier matched against the container's pod UID label
    pub pod_identifier: String,

    /// Target repository (e.g. 123456789012.dkr.ecr.us-east-1.amazonaws.com/checkpoints)
    pub ecr_repo: String,

    /// Region used to request registry credentials
    pub aws_region: String,
}

/// Run the pipeline with production collaborators configured from the
/// environment.
pub async fn execute(cli: Cli, dispatch: Dispatch) -> Result<PipelineReport> {
    let config = PipelineConfig::from_env()?;
    let collaborators = Collaborators::from_config(&config);
    execute_with(cli, &config, collaborators, Observability::new(dispatch)).await
}

pub async fn execute_with(
    cli: Cli,
    config: &PipelineConfig,
    collaborators: Collaborators,
    observability: Observability,
) -> Result<PipelineReport> {
    let pipeline = CheckpointPipeline::new(config, collaborators, observability);
    pipeline
        .run(
            &PodIdentifier::new(cli.pod_identifier),
            &cli.ecr_repo,
            &cli.aws_region,
        )
        .await
}
