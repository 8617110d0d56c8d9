use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use keybridge_commands::CommandRegistry;
use keybridge_config::{normalize_listen_address, ConfigError, GatewayConfig, KEY_FILE_VAR};
use keybridge_core::simulator::{SimulatedCar, SimulatedConnector, SimulatedVehicleFactory};
use keybridge_gateway::{bind, render_listing, shutdown_signal, start_server, Dispatcher, NO_KEY_WARNING};
use keybridge_logging::{init_logger, redact_vin};
use keybridge_session::{SessionManager, SessionSettings};

#[derive(Parser)]
#[command(name = "keybridge")]
#[command(about = "keybridge: local HTTP gateway for vehicle commands")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway (default)
    Serve {
        /// Listen address, overrides LISTEN_ADDRESS
        #[arg(short, long)]
        listen: Option<String>,
    },
    /// Print the command listing and exit
    Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let listen = match cli.command.unwrap_or(Commands::Serve { listen: None }) {
        Commands::Commands => {
            let key_set = std::env::var_os(KEY_FILE_VAR).is_some_and(|v| !v.is_empty());
            print!("{}", render_listing(&CommandRegistry::new(), key_set));
            return ExitCode::SUCCESS;
        }
        Commands::Serve { listen } => listen,
    };

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}. Exiting");
            return ExitCode::from(e.exit_code());
        }
    };

    init_logger(&config.log_level, config.log_dir.as_deref());

    match run_server(config, listen).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            let code = e.downcast_ref::<ConfigError>().map_or(1, ConfigError::exit_code);
            ExitCode::from(code)
        }
    }
}

async fn run_server(config: GatewayConfig, listen: Option<String>) -> Result<()> {
    for warning in &config.warnings {
        warn!("{warning}");
    }

    let key = config.load_key()?.map(Arc::new);
    match &key {
        Some(key) => info!(fingerprint = %key.fingerprint(), "loaded private key"),
        None => warn!("{NO_KEY_WARNING}"),
    }

    // Only the simulated radio is linked into this binary.
    warn!("no BLE backend available, commands go to a simulated vehicle");
    let car = SimulatedCar::new();

    let registry = Arc::new(CommandRegistry::new());
    let sessions = SessionManager::new(
        Arc::new(SimulatedConnector::new(car.clone())),
        Arc::new(SimulatedVehicleFactory::new(car)),
        registry.clone(),
        SessionSettings {
            device_id: config.device_id.clone(),
            key: key.clone(),
            timeout: config.timeout,
            idle_timeout: config.idle_timeout,
        },
    );
    let dispatcher = Arc::new(Dispatcher::new(
        registry,
        Arc::new(sessions.clone()),
        key.is_some(),
        config.timeout,
    ));

    let addr = listen
        .as_deref()
        .map(normalize_listen_address)
        .unwrap_or_else(|| config.listen_address.clone());
    let listener = bind(&addr).await?;

    info!(
        vin = %redact_vin(config.device_id.as_str()),
        timeout_secs = config.timeout.as_secs(),
        idle_secs = config.idle_timeout.as_secs(),
        "Starting keybridge gateway"
    );
    let result = start_server(listener, dispatcher, shutdown_signal()).await;

    sessions.invalidate().await;
    info!("keybridge stopped");
    result
}
