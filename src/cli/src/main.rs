//! Pod checkpoint CLI entry point.

use clap::Parser;

use pod_checkpoint_cli::command::{execute, Cli};
use pod_checkpoint_cli::logging;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let dispatch = logging::dispatch_from_env();

    match execute(cli, dispatch).await {
        Ok(report) => println!("{}", report.image),
        Err(e) => {
            eprintln!("Error: {}: {e}", e.kind());
            std::process::exit(1);
        }
    }
}
