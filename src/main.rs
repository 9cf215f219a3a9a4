//! dock-pilot: A terminal UI for Docker containers and compose projects

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use dock_pilot_core::projects::{current_dir_project, is_compose_project_dir};
use dock_pilot_core::{
    DashboardState, Inventory, Orchestrator, StatsRecorder, TaskManager, UserConfig,
};
use dock_pilot_tui::{App, AppContext};
use dock_rs::{ComposeApi, ComposeCli, DockerClient, HostSources, RuntimeApi, SshTunneler};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::{EnvFilter, prelude::*};

/// dock-pilot: Terminal UI for Docker containers and compose projects
#[derive(Parser, Debug)]
#[command(name = "dock-pilot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Docker daemon endpoint, overrides DOCKER_HOST and the current context
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Docker context to use, overrides DOCKER_CONTEXT
    #[arg(short, long)]
    context: Option<String>,

    /// Path to the dock-pilot config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory to look for a compose project in (default: current directory)
    #[arg(short, long)]
    project_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Log file path (default: /tmp/dock-pilot.log)
    #[arg(long, default_value = "/tmp/dock-pilot.log")]
    log_file: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    color_eyre::install()?;

    // Log to a file; stdout belongs to the TUI
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let log_file = File::create(&cli.log_file)
        .wrap_err_with(|| format!("could not create log file {}", cli.log_file))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(log_file)
                .with_ansi(false)
                .with_target(false),
        )
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    tracing::info!("Starting dock-pilot");

    let config_path = match cli.config {
        Some(path) => path,
        None => UserConfig::default_path()?,
    };
    let config = UserConfig::load_from(&config_path)?;

    let sources = HostSources::from_env()?
        .with_host(cli.host)
        .with_context(cli.context);
    let resolved = dock_rs::resolve_host(&sources, &SshTunneler::new())
        .await
        .wrap_err("could not resolve the docker host")?;
    if resolved.releaser.has_tunnel() {
        tracing::info!("Using docker endpoint {} (ssh tunnel)", resolved.endpoint);
    } else {
        tracing::info!("Using docker endpoint {}", resolved.endpoint);
    }

    let result = run(&resolved.endpoint, config, cli.project_dir).await;

    if let Err(e) = resolved.releaser.release().await {
        tracing::error!("Failed to release docker host: {}", e);
    }

    tracing::info!("Goodbye!");
    result
}

async fn run(endpoint: &str, config: UserConfig, project_dir: Option<PathBuf>) -> Result<()> {
    let client = DockerClient::connect(endpoint)
        .await
        .wrap_err_with(|| format!("could not connect to docker at {}", endpoint))?;
    let runtime: Arc<dyn RuntimeApi> = Arc::new(client);

    let compose: Arc<dyn ComposeApi> =
        Arc::new(ComposeCli::detect(&config.command_templates.docker_compose).await);

    let dir = match project_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let dir = std::fs::canonicalize(&dir).unwrap_or(dir);
    let started_in = is_compose_project_dir(&dir).then_some(dir);
    match &started_in {
        Some(dir) => tracing::info!("Compose project directory: {}", dir.display()),
        None => tracing::info!("Not in a compose project, showing containers only"),
    }
    let initial = DashboardState::for_project(started_in.as_deref().map(current_dir_project));

    let inventory = Arc::new(Inventory::new(
        runtime.clone(),
        config.refresh.inspect_concurrency,
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        inventory,
        compose,
        started_in.clone(),
        initial,
    ));
    let ctx = AppContext {
        orchestrator,
        tasks: Arc::new(TaskManager::new(config.gui.stop_timeout())),
        recorder: Arc::new(StatsRecorder::new(runtime, config.stats.max_duration())),
        compose_mode: started_in.is_some(),
        config,
    };

    let mut app = App::new(ctx);
    app.run().await
}
