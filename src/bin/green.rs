//! green: the load-shedding upstream service.

use clap::Parser;
use tokio::net::TcpListener;

use puch::config::{load_or_default, ConfigError, GreenConfig, ServiceArgs, Validate};
use puch::observability::logging::init_logging;
use puch::{GreenServer, Shutdown};

#[derive(Parser)]
#[command(name = "green")]
#[command(about = "Upstream service that degrades under load", long_about = None)]
struct Cli {
    #[command(flatten)]
    service: ServiceArgs,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut cli = Cli::parse();
    cli.service = cli.service.with_legacy_env();

    let mut config: GreenConfig = load_or_default(cli.service.config.as_deref())?;
    cli.service.apply(&mut config.service, &mut config.listener);
    config.validate().map_err(ConfigError::Validation)?;

    init_logging(&config.observability)?;

    tracing::info!(
        service = %config.service.name,
        environment = %config.service.environment,
        tracing_endpoint = config.service.tracing_endpoint.as_deref().unwrap_or("-"),
        bind_address = %config.listener.bind_address,
        nominal_limit = config.load.nominal_limit,
        degraded_limit = config.load.degraded_limit,
        degraded_cooldown_secs = config.load.degraded_cooldown_secs,
        overloaded_cooldown_secs = config.load.overloaded_cooldown_secs,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let shutdown = Shutdown::new();

    GreenServer::new(config)
        .run(listener, shutdown.subscribe())
        .await?;

    tracing::info!("green stopped");
    Ok(())
}
