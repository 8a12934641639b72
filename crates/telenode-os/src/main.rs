//! The `telenode` service.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use tokio::runtime::{Builder, Handle};

use tracing::{Level, error, info};

use telenode::node::Node;

use telenode_os::config::ProvisioningFile;
use telenode_os::error::Result;
use telenode_os::link::HostLink;
use telenode_os::runner::{Exit, RESTART_EXIT_CODE, run};
use telenode_os::sensors::SimulatedSensors;
use telenode_os::transport::MqttTransport;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Provisioning file.
    #[arg(short, long, default_value = "telenode.toml")]
    config: PathBuf,

    /// Maximum log level.
    #[arg(short, long, default_value_t = Level::INFO)]
    log_level: Level,
}

async fn start(cli: Cli) -> Result<Exit> {
    let settings = ProvisioningFile::load(&cli.config)?.into_settings()?;

    let link = HostLink::new(
        Handle::current(),
        &settings.provisioning.broker,
        settings.rssi,
    );
    let transport = MqttTransport::new(Handle::current());
    let sensors = SimulatedSensors::new(settings.sensors);

    let node = Node::new(
        &settings.node,
        settings.provisioning,
        link,
        transport,
        sensors,
    )?;

    info!("Node started from `{}`", cli.config.display());

    Ok(run(node, settings.tick, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Cannot listen for the shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .init();

    let runtime = match Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Cannot start the runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(start(cli)) {
        Ok(Exit::Stopped) => ExitCode::SUCCESS,
        Ok(Exit::Restart(_)) => std::process::exit(RESTART_EXIT_CODE),
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
