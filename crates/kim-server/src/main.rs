//! Entry point for the inertial motor positioning server.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use kim_core::MotorFactory;
use kim_driver_kinesis::KinesisFactory;
use kim_driver_mock::{MockMotor, MockMotorFactory};
use kim_server::{ControlServer, DriverKind, KimServer, ServerConfig};

#[derive(Parser)]
#[command(
    name = "kim-server",
    about = "Sequencer-facing positioning server for Thorlabs inertial motor K-Cubes"
)]
struct Cli {
    /// Path to the server configuration file
    #[arg(long, default_value = "kim-server.toml")]
    config: PathBuf,

    /// Override the configured control port
    #[arg(long)]
    port: Option<u16>,

    /// Use mock motors instead of hardware, one per configured serial
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig::load(&cli.config)?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    let factory: Arc<dyn MotorFactory> = if cli.mock || config.driver == DriverKind::Mock {
        let factory = MockMotorFactory::new();
        for serial in &config.serials {
            factory.add(MockMotor::new(serial)).await;
        }
        Arc::new(factory)
    } else {
        Arc::new(KinesisFactory)
    };

    let port = config.port;
    let server = Arc::new(KimServer::connect(config, factory.as_ref()).await?);
    ControlServer::bind(port, server)
        .await?
        .serve_until_interrupted()
        .await
}
