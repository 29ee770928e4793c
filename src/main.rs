//! Pipette GW - gamepad-driven pipetting gateway

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use pipette_gw::actuator::{ActuatorDriver, SimulatedActuator};
use pipette_gw::bus::{self, LocalBus, SharedBus};
use pipette_gw::config::AppConfig;
use pipette_gw::input::gamepad::{print_gamepad_diagnostics, GilrsProvider};
use pipette_gw::input::InputEvent;
use pipette_gw::node::{shutdown_channel, ActuatorNode, InputNode};
use pipette_gw::protocol::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum NodeRole {
    /// Gamepad, navigation and action dispatch
    Input,
    /// Command executor over the simulated actuator
    Actuator,
    /// Both nodes in one process over an in-process bus
    Both,
}

/// Pipette GW - drive a pipetting robot from a gamepad
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Which node to run
    #[arg(long, value_enum, default_value = "both")]
    node: NodeRole,

    /// Redis URL, overrides `bus.url` from the config file
    #[arg(long, env = "PIPETTE_BUS_URL")]
    bus_url: Option<String>,

    /// List connected gamepads and exit
    #[arg(long)]
    list_gamepads: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level, args.log_json)?;

    if args.list_gamepads {
        print_gamepad_diagnostics();
        return Ok(());
    }

    info!("Starting Pipette GW v{}...", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(&args.config).await?;
    if args.bus_url.is_some() {
        config.bus.url = args.bus_url.clone();
    }

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let result = match args.node {
        NodeRole::Input => {
            let bus = connect_bus(&config).await?;
            run_input(config, bus, shutdown_rx).await
        }
        NodeRole::Actuator => {
            let bus = connect_bus(&config).await?;
            actuator_node(config, bus).run(shutdown_rx).await
        }
        NodeRole::Both => {
            if config.bus.url.is_some() {
                info!("Running both nodes in-process; ignoring configured bus URL");
            }
            let bus: SharedBus = Arc::new(LocalBus::new());
            // Subscribed before the input node can publish its first command
            let runner = actuator_node(config.clone(), bus.clone()).start().await?;
            let actuator = tokio::spawn(runner.run(shutdown_rx.clone()));
            let input = run_input(config, bus, shutdown_rx).await;
            actuator.await.context("Actuator node panicked")?;
            input
        }
    };

    if let Err(e) = &result {
        error!("Fatal: {:#}", e);
    }
    info!("Pipette GW shutdown complete");
    result
}

async fn load_config(path: &str) -> Result<AppConfig> {
    if !Path::new(path).exists() {
        warn!("Config file {} not found, using defaults", path);
        return Ok(AppConfig::default());
    }
    let config = AppConfig::load(path).await?;
    info!("Configuration loaded from {}", path);
    Ok(config)
}

async fn connect_bus(config: &AppConfig) -> Result<SharedBus> {
    let bus = bus::connect(config.bus.url.as_deref())
        .await
        .context("Failed to connect to command bus")?;
    info!("Connected to {} bus", bus.name());
    Ok(bus)
}

async fn run_input(config: AppConfig, bus: SharedBus, shutdown: watch::Receiver<bool>) -> Result<()> {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<InputEvent>();

    // Keep the provider alive for the lifetime of the node
    let mut provider = if config.gamepad.enabled {
        match GilrsProvider::start(&config.gamepad, event_tx.clone()) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("Gamepad unavailable: {}", e);
                None
            }
        }
    } else {
        info!("Gamepad disabled in config");
        None
    };

    let result = InputNode::new(config, bus).run(event_rx, shutdown).await;
    drop(event_tx);

    if let Some(p) = provider.as_mut() {
        p.shutdown().await;
    }
    result
}

fn actuator_node(config: AppConfig, bus: SharedBus) -> ActuatorNode {
    let home = Point::new(
        config.motion.start_x,
        config.motion.start_y,
        config.motion.travel_height,
    );
    let driver: Arc<dyn ActuatorDriver> = Arc::new(SimulatedActuator::new(home, config.actuator.max_volume));
    info!("Using {} actuator driver", driver.name());

    ActuatorNode::new(config, bus, driver)
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Invalid log level")?;

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer().json().with_target(false).boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
