use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod api;

use accord_github::{GitHubBackend, GitHubConfig};
use accord_workflow::{LogOnlyLoader, Orchestrator, PollConfig};

#[derive(Parser)]
#[command(name = "accord", version, about = "RFC lifecycle service for a shared data schema")]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Attempts per mergeability settle loop.
    #[arg(long, default_value_t = 3)]
    poll_attempts: u32,

    /// Seconds to wait between mergeability polls.
    #[arg(long, default_value_t = 10)]
    poll_wait_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let user = GitHubBackend::new(GitHubConfig::from_env("GITHUB_TOKEN")?);
    let machine = GitHubBackend::new(GitHubConfig::from_env("GITHUB_MACHINE_TOKEN")?);

    let orchestrator = Orchestrator::new(
        Arc::new(user),
        Arc::new(machine),
        Arc::new(LogOnlyLoader),
    )
    .with_poll_config(PollConfig {
        max_attempts: cli.poll_attempts,
        wait: Duration::from_secs(cli.poll_wait_secs),
    });

    let app = api::router(Arc::new(orchestrator));

    let listener = tokio::net::TcpListener::bind(&cli.listen).await?;
    tracing::info!(listen = %cli.listen, "accord listening");
    axum::serve(listener, app).await?;
    Ok(())
}
