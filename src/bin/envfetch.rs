use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use envfetch::artifact::SizeClass;
use envfetch::catalog::{ArtifactCatalog, Extension};
use envfetch::config::{load_config, validate_config, ConnectivityMode, FetchConfig};
use envfetch::dispatch::FetchDispatcher;
use envfetch::gate::NetworkGate;
use envfetch::oracle::{FixedConnectivity, FsExistence, SysfsConnectivity};
use envfetch::prompt::TerminalPrompt;
use envfetch::resolve::RequirementResolver;
use envfetch::session::{FetchSession, SessionOutcome};
use envfetch::transfer::{network_probe, QueueEngine};
use envfetch::ConnectivityOracle;
use envfetch_queue::{DownloadQueue, DownloadStatus};

/// Exit code when the user asked to switch networks before fetching.
const EXIT_AWAIT_NETWORK: i32 = 2;
/// Exit code when one or more transfers could not be queued or completed.
const EXIT_TRANSFER_FAILED: i32 = 3;

#[derive(Parser)]
#[command(name = "envfetch", version, about = "Fetch the artifacts a runnable environment needs")]
struct Cli {
    /// YAML or JSON config file
    #[arg(long, global = true, env = "ENVFETCH_CONFIG")]
    config: Option<PathBuf>,

    /// Distribution whose artifacts are added to the base set
    #[arg(long, short = 'd', global = true)]
    distribution: Option<String>,

    /// Override the local artifact root
    #[arg(long, global = true)]
    local_root: Option<PathBuf>,

    /// Override connectivity detection
    #[arg(long, global = true, value_enum)]
    connectivity: Option<ConnectivityArg>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the composed catalog
    Catalog,
    /// Show which artifacts are missing and whether the network gate would ask
    Plan,
    /// Resolve, gate and submit transfers
    Fetch {
        /// Wait for submitted transfers to finish
        #[arg(long)]
        wait: bool,
    },
    /// Check a config file
    Validate {
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ConnectivityArg {
    Auto,
    Metered,
    Unmetered,
}

impl From<ConnectivityArg> for ConnectivityMode {
    fn from(arg: ConnectivityArg) -> Self {
        match arg {
            ConnectivityArg::Auto => ConnectivityMode::Auto,
            ConnectivityArg::Metered => ConnectivityMode::Metered,
            ConnectivityArg::Unmetered => ConnectivityMode::Unmetered,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::Validate { file } => cmd_validate(file)?,
        Command::Catalog => {
            let config = effective_config(&cli)?;
            cmd_catalog(&compose_catalog(&config, cli.distribution.as_deref())?);
        }
        Command::Plan => {
            let config = effective_config(&cli)?;
            let catalog = compose_catalog(&config, cli.distribution.as_deref())?;
            cmd_plan(&config, catalog)?;
        }
        Command::Fetch { wait } => {
            let config = effective_config(&cli)?;
            let catalog = compose_catalog(&config, cli.distribution.as_deref())?;
            cmd_fetch(&config, catalog, *wait).await?;
        }
    }
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(file)?;
    validate_config(&config)?;
    println!(
        "valid: {} (base={}, distributions={})",
        file.display(),
        config.base_catalog()?.len(),
        config.distribution_sets().tags().collect::<Vec<_>>().join(",")
    );
    Ok(())
}

fn effective_config(cli: &Cli) -> Result<FetchConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => FetchConfig::default(),
    };
    if let Some(root) = &cli.local_root {
        config.local_root = root.clone();
    }
    if let Some(mode) = cli.connectivity {
        config.connectivity = mode.into();
    }
    Ok(config)
}

fn compose_catalog(
    config: &FetchConfig,
    distribution: Option<&str>,
) -> Result<ArtifactCatalog, Box<dyn std::error::Error>> {
    let (catalog, extension) = config.catalog_for(distribution)?;
    if let Some(Extension::UnknownDistribution { tag }) = extension {
        eprintln!("note: no extra artifacts known for distribution '{}'", tag);
    }
    Ok(catalog)
}

fn connectivity_oracle(mode: ConnectivityMode) -> Arc<dyn ConnectivityOracle> {
    match mode {
        ConnectivityMode::Auto => Arc::new(SysfsConnectivity::default()),
        ConnectivityMode::Metered => Arc::new(FixedConnectivity::metered()),
        ConnectivityMode::Unmetered => Arc::new(FixedConnectivity::unmetered()),
    }
}

fn cmd_catalog(catalog: &ArtifactCatalog) {
    for d in catalog {
        println!("{:<32} {:<6} {}", d.id.to_string(), size_label(d.size), d.source);
    }
}

/// Session wired to the filesystem, the configured connectivity, a terminal
/// prompt and the bundled download queue.
fn build_session(
    config: &FetchConfig,
    catalog: ArtifactCatalog,
) -> Result<(FetchSession, Arc<QueueEngine>), Box<dyn std::error::Error>> {
    let connectivity = connectivity_oracle(config.connectivity);
    let queue = DownloadQueue::builder(config.download_dir())
        .network_probe(network_probe(connectivity.clone()))
        .poll_interval(config.poll_interval()?)
        .build()?;
    let engine = Arc::new(QueueEngine::new(queue));

    let session = FetchSession::new(
        catalog,
        RequirementResolver::new(&config.local_root, Arc::new(FsExistence)),
        NetworkGate::new(connectivity, Arc::new(TerminalPrompt::stdio())),
        FetchDispatcher::new(engine.clone()).destination_prefix(config.destination_prefix.clone()),
    );
    Ok((session, engine))
}

fn cmd_plan(config: &FetchConfig, catalog: ArtifactCatalog) -> Result<(), Box<dyn std::error::Error>> {
    let (session, _) = build_session(config, catalog)?;
    let plan = session.plan()?;

    println!("local root: {}", config.local_root.display());
    println!("required: {} of {}", plan.required.len(), session.catalog().len());
    for d in &plan.required {
        println!("  {:<32} {}", d.id.to_string(), size_label(d.size));
    }
    println!("needs confirmation: {}", plan.needs_confirmation);
    Ok(())
}

async fn cmd_fetch(
    config: &FetchConfig,
    catalog: ArtifactCatalog,
    wait: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (session, engine) = build_session(config, catalog)?;

    let report = match session.run().await? {
        SessionOutcome::NothingToFetch => {
            println!("all artifacts present");
            return Ok(());
        }
        SessionOutcome::Cancelled => {
            println!("cancelled");
            return Ok(());
        }
        SessionOutcome::AwaitBetterNetwork => {
            println!("switch to an unmetered network and run fetch again");
            std::process::exit(EXIT_AWAIT_NETWORK);
        }
        SessionOutcome::Dispatched(report) => report,
    };

    for q in &report.queued {
        println!("queued {:<32} handle={}", q.artifact.id.to_string(), q.handle);
    }
    for f in &report.failed {
        eprintln!("failed {:<32} {}", f.artifact.id.to_string(), f.error);
    }

    let mut failures = report.failed.len();
    if wait {
        println!("downloads: {}", engine.queue().download_dir().display());
        for q in &report.queued {
            match engine.wait(q.handle).await {
                Some(DownloadStatus::Completed { path, bytes }) => {
                    println!("done   {:<32} {} bytes -> {}", q.artifact.id.to_string(), bytes, path.display());
                }
                Some(DownloadStatus::Failed { reason }) => {
                    failures += 1;
                    eprintln!("error  {:<32} {}", q.artifact.id.to_string(), reason);
                }
                other => {
                    failures += 1;
                    eprintln!("error  {:<32} unexpected status {:?}", q.artifact.id.to_string(), other);
                }
            }
        }
    }

    if failures > 0 {
        std::process::exit(EXIT_TRANSFER_FAILED);
    }
    Ok(())
}

fn size_label(size: SizeClass) -> &'static str {
    match size {
        SizeClass::Small => "small",
        SizeClass::Large => "large",
    }
}
