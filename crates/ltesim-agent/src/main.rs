//! LTE Simulator Agent
//!
//! Runs on the host attached to the SDR.
//!
//! - Generates and renders srsEPC/srsENB configuration
//! - Starts, monitors and stops the core network and base station
//! - Discovers, connects, tests and calibrates the radio front end
//! - Serves a local JSON control portal

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ltesim_agent::device::DeviceController;
use ltesim_agent::orchestrator::NetworkOrchestrator;
use ltesim_agent::settings::{Paths, Settings};
use ltesim_agent::{generator, portal, render};
use ltesim_common::models::NetworkParams;

/// LTE simulator orchestrator.
#[derive(Parser, Debug)]
#[command(name = "ltesim-agent", about = "LTE simulator agent")]
struct Cli {
    /// Settings file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base directory for config/, logs/ and data/; overrides the settings file.
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate and render a configuration without starting anything.
    Generate(NetworkArgs),
    /// Start the network and serve the control portal until Ctrl-C.
    Run {
        #[command(flatten)]
        network: NetworkArgs,
        /// Control portal listen address.
        #[arg(long, default_value = "127.0.0.1:3001")]
        portal_addr: String,
        /// Do not start the control portal.
        #[arg(long, default_value_t = false)]
        no_portal: bool,
    },
    /// Serve the control portal only; the network is started through it.
    Serve {
        #[arg(long, default_value = "127.0.0.1:3001")]
        portal_addr: String,
    },
    /// SDR device operations.
    Device {
        #[command(subcommand)]
        action: DeviceCommand,
    },
}

#[derive(Subcommand, Debug)]
enum DeviceCommand {
    /// List attached devices.
    Discover,
    /// Probe the device and run a receive smoke test.
    Connect(DeviceArgs),
    /// Connect, then run the device test battery.
    Test(DeviceArgs),
    /// Connect, then run DC offset, IQ imbalance and frequency sweep.
    Calibrate(DeviceArgs),
}

#[derive(Args, Debug)]
struct NetworkArgs {
    /// Mobile country code.
    #[arg(long, default_value = "456")]
    mcc: String,
    /// Mobile network code.
    #[arg(long, default_value = "06")]
    mnc: String,
    /// Cell id, or `auto`.
    #[arg(long, default_value = "auto")]
    cell_id: String,
    /// Location area code, or `auto`.
    #[arg(long, default_value = "auto")]
    lac: String,
    /// LTE band (1, 3, 8 or 20).
    #[arg(long, default_value = "3")]
    band: String,
}

impl From<NetworkArgs> for NetworkParams {
    fn from(a: NetworkArgs) -> Self {
        NetworkParams {
            mcc: a.mcc,
            mnc: a.mnc,
            cell_id: a.cell_id,
            lac: a.lac,
            band: a.band,
        }
    }
}

#[derive(Args, Debug)]
struct DeviceArgs {
    /// UHD device args; defaults to the configured ones.
    #[arg(long)]
    args: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref()).map_err(anyhow::Error::msg)?;
    if let Some(dir) = &cli.base_dir {
        settings.paths = Paths::under(dir);
    }

    tracing::info!(
        config_dir = %settings.paths.config_dir.display(),
        core = %settings.network.core_bin,
        base_station = %settings.network.base_station_bin,
        "ltesim-agent starting"
    );

    match cli.command {
        Commands::Generate(network) => generate(&settings, network.into()).await,
        Commands::Run {
            network,
            portal_addr,
            no_portal,
        } => {
            let addr = (!no_portal)
                .then(|| portal_addr.parse::<SocketAddr>())
                .transpose()?;
            run(settings, network.into(), addr).await
        }
        Commands::Serve { portal_addr } => serve(settings, portal_addr.parse()?).await,
        Commands::Device { action } => device(&settings, action).await,
    }
}

async fn generate(settings: &Settings, params: NetworkParams) -> anyhow::Result<()> {
    let config = generator::generate(&params)?;
    let files = render::write_all(&config, &settings.paths, &settings.device.device_args).await?;
    tracing::info!(
        epc = %files.epc_conf.display(),
        enb = %files.enb_conf.display(),
        "files written"
    );
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

async fn run(
    settings: Settings,
    params: NetworkParams,
    portal_addr: Option<SocketAddr>,
) -> anyhow::Result<()> {
    let device = DeviceController::new(&settings.device);
    let (orchestrator, actor) = NetworkOrchestrator::spawn(settings);

    let config = match orchestrator.start(params).await {
        Ok(config) => config,
        Err(e) => {
            let _ = orchestrator.shutdown().await;
            let _ = actor.await;
            return Err(e).context("network failed to start");
        }
    };
    tracing::info!(
        network = %config.network_name,
        plmn = %config.plmn_id,
        "network up, Ctrl-C to stop"
    );

    let state = portal::AppState::new(orchestrator.clone(), device);
    let portal_handle = portal_addr.map(|addr| tokio::spawn(portal::serve(state, addr)));

    wait_for_shutdown(portal_handle).await;

    orchestrator.shutdown().await?;
    if let Err(e) = actor.await {
        tracing::error!("orchestrator task failed: {e}");
    }
    tracing::info!("ltesim-agent stopped");
    Ok(())
}

async fn serve(settings: Settings, addr: SocketAddr) -> anyhow::Result<()> {
    let device = DeviceController::new(&settings.device);
    let (orchestrator, actor) = NetworkOrchestrator::spawn(settings);
    let state = portal::AppState::new(orchestrator.clone(), device);

    wait_for_shutdown(Some(tokio::spawn(portal::serve(state, addr)))).await;

    orchestrator.shutdown().await?;
    if let Err(e) = actor.await {
        tracing::error!("orchestrator task failed: {e}");
    }
    tracing::info!("ltesim-agent stopped");
    Ok(())
}

/// Ctrl-C, or the portal task ending.
async fn wait_for_shutdown(portal: Option<tokio::task::JoinHandle<anyhow::Result<()>>>) {
    match portal {
        Some(handle) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("received SIGINT, shutting down");
                }
                result = handle => match result {
                    Ok(Ok(())) => tracing::info!("portal exited"),
                    Ok(Err(e)) => tracing::error!("portal failed: {e}"),
                    Err(e) => tracing::error!("portal task failed: {e}"),
                },
            }
        }
        None => {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("cannot listen for Ctrl-C: {e}");
            } else {
                tracing::info!("received SIGINT, shutting down");
            }
        }
    }
}

async fn device(settings: &Settings, action: DeviceCommand) -> anyhow::Result<()> {
    let mut controller = DeviceController::new(&settings.device);
    let output = match action {
        DeviceCommand::Discover => serde_json::to_value(controller.discover().await)?,
        DeviceCommand::Connect(a) => {
            serde_json::to_value(controller.connect(a.args.as_deref()).await?)?
        }
        DeviceCommand::Test(a) => {
            controller.connect(a.args.as_deref()).await?;
            serde_json::to_value(controller.run_tests().await?)?
        }
        DeviceCommand::Calibrate(a) => {
            controller.connect(a.args.as_deref()).await?;
            serde_json::to_value(controller.calibrate().await?)?
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
