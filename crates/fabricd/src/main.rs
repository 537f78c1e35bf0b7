//! fabricd entry point.

use clap::Parser;
use fabric_rib::Rib;
use fabric_state::SwitchState;
use fabricd::config::AgentConfig;
use fabricd::hw::NullHwSwitch;
use fabricd::neighbor::NeighborUpdater;
use fabricd::packet::NullPacketIo;
use fabricd::programmer::HwProgrammer;
use fabricd::state_manager::StateManager;
use fabricd::Agent;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Fabric switch agent
#[derive(Parser, Debug)]
#[command(name = "fabricd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) -> Result<(), String> {
    let level: Level = level
        .parse()
        .map_err(|_| format!("invalid log level: {}", level))?;
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("failed to set logger: {}", e))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("fabricd: {}", e);
        return ExitCode::FAILURE;
    }

    info!("fabricd starting");

    let config = match &args.config {
        Some(path) => match AgentConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, path = %path.display(), "failed to load config");
                return ExitCode::FAILURE;
            }
        },
        None => AgentConfig::default(),
    };

    let initial = match config.initial_state() {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let (mut manager, handle) = StateManager::new(Arc::new(SwitchState::new()));

    let hw: Arc<dyn fabricd::hw::HwSwitch> = Arc::new(NullHwSwitch);
    let io: Arc<dyn fabricd::packet::PacketIo> = Arc::new(NullPacketIo);
    let updater = NeighborUpdater::new(
        config.cache_config(),
        Arc::clone(&io),
        Arc::clone(&hw),
        handle.clone(),
    );

    // Observers run in registration order: hardware first, then the
    // neighbor subsystem reacting to the same publication.
    manager.add_observer(Box::new(HwProgrammer::new(Arc::clone(&hw))));
    manager.add_observer(Box::new(updater.clone()));

    let rib = Arc::new(Rib::new(config.vrf_ids()));
    let _agent = Agent::new(rib, handle.clone());

    // Seed the configured topology through the queue so observers see a
    // single initial delta.
    handle.update("apply-config", move |_| Some(initial));

    let manager_task = tokio::spawn(manager.run());

    info!(vlans = updater.vlan_count(), "fabricd running");

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received SIGINT, shutting down"),
        Err(e) => error!(error = %e, "failed to listen for ctrl-c"),
    }

    manager_task.abort();
    info!("fabricd shutdown complete");
    ExitCode::SUCCESS
}
