use anyhow::Result;
use clap::{Parser, Subcommand};
use flotilla_core::{
    ArtifactPublisher, CookbookBuilder, DeploymentDispatcher, Deployer, FleetDeployer,
    GitFingerprint, HttpFleetClient, HttpObjectStore, LogReporter, Orchestrator, StackAnalyzer,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flotilla")]
#[command(about = "Fleet deployment orchestration CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild stale cookbooks and deploy apps across stacks
    Deploy {
        /// Stack identifiers to deploy
        #[arg(required = true)]
        stacks: Vec<String>,

        #[command(flatten)]
        connection: ConnectionArgs,

        /// Directory holding local cookbook definitions
        #[arg(long, default_value = "cookbooks")]
        cookbook_dir: PathBuf,

        /// Working directory for cookbook builds
        #[arg(long, default_value = ".flotilla/build")]
        build_dir: PathBuf,

        /// Seconds between deployment status polls
        #[arg(long, default_value = "2")]
        poll_interval: u64,

        /// Maximum seconds to wait per command (default: wait forever)
        #[arg(long)]
        deadline: Option<u64>,
    },

    /// Analyze stacks without building or deploying anything
    Analyze {
        /// Stack identifiers to analyze
        #[arg(required = true)]
        stacks: Vec<String>,

        #[command(flatten)]
        connection: ConnectionArgs,

        /// Directory holding local cookbook definitions
        #[arg(long, default_value = "cookbooks")]
        cookbook_dir: PathBuf,
    },
}

#[derive(clap::Args)]
struct ConnectionArgs {
    /// Fleet service endpoint
    #[arg(long, env = "FLOTILLA_ENDPOINT")]
    endpoint: String,

    /// Artifact store endpoint
    #[arg(long, env = "FLOTILLA_STORE_ENDPOINT")]
    store_endpoint: String,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .init();
}

fn build_deployer(
    connection: &ConnectionArgs,
    cookbook_dir: PathBuf,
    build_dir: PathBuf,
    poll_interval: Duration,
    deadline: Option<Duration>,
) -> Result<Arc<FleetDeployer>> {
    let token = std::env::var("FLOTILLA_TOKEN").ok();
    let fleet = Arc::new(HttpFleetClient::new(connection.endpoint.clone(), token.clone())?);
    let store = Arc::new(HttpObjectStore::new(connection.store_endpoint.clone(), token)?);
    let reporter = Arc::new(LogReporter);

    let analyzer = StackAnalyzer::new(
        fleet.clone(),
        store.clone(),
        Arc::new(GitFingerprint::new()),
        reporter.clone(),
        cookbook_dir,
    );
    let builder = CookbookBuilder::new(build_dir);
    let publisher = ArtifactPublisher::new(store, reporter.clone());
    let mut dispatcher =
        DeploymentDispatcher::new(fleet, reporter).with_poll_interval(poll_interval);
    if let Some(deadline) = deadline {
        dispatcher = dispatcher.with_deadline(deadline);
    }
    Ok(Arc::new(FleetDeployer::new(analyzer, builder, publisher, dispatcher)))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Deploy { stacks, connection, cookbook_dir, build_dir, poll_interval, deadline } => {
            let deployer = build_deployer(
                &connection,
                cookbook_dir,
                build_dir,
                Duration::from_secs(poll_interval),
                deadline.map(Duration::from_secs),
            )?;
            let orchestrator = Orchestrator::new(deployer, Arc::new(LogReporter));

            let report = match orchestrator.deploy(&stacks).await {
                Ok(report) => report,
                Err(e) => {
                    eprintln!("Analysis failed: {e}");
                    std::process::exit(1);
                }
            };

            for stack in &report.succeeded {
                println!("{stack}: deployed");
            }
            for (stack, error) in &report.failed {
                println!("{stack}: FAILED - {error}");
            }
            if !report.is_success() {
                std::process::exit(1);
            }
        }

        Commands::Analyze { stacks, connection, cookbook_dir } => {
            let deployer = build_deployer(
                &connection,
                cookbook_dir,
                PathBuf::new(),
                Duration::from_secs(2),
                None,
            )?;
            let analysis = deployer.analyze(&stacks).await?;

            for target in &analysis.targets {
                let cookbook = target
                    .cookbook
                    .as_ref()
                    .and_then(|c| c.name.as_deref())
                    .unwrap_or("-");
                println!(
                    "{:<24} apps={:<3} cookbook={}",
                    target.stack.name,
                    target.apps.len(),
                    cookbook
                );
            }
            if analysis.stale_cookbooks.is_empty() {
                println!("All cookbook artifacts up to date");
            } else {
                for descriptor in &analysis.stale_cookbooks {
                    println!(
                        "stale: {}/{} (local {}, remote {})",
                        descriptor.location,
                        descriptor.artifact_key,
                        &descriptor.local_fingerprint,
                        if descriptor.remote_fingerprint.is_empty() {
                            "none"
                        } else {
                            descriptor.remote_fingerprint.as_str()
                        },
                    );
                }
            }
        }
    }

    Ok(())
}
