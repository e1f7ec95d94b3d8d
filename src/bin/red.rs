//! red: the downstream service calling green with and without a breaker.

use clap::Parser;
use tokio::net::TcpListener;

use puch::config::{load_or_default, ConfigError, RedConfig, ServiceArgs, Validate};
use puch::observability::logging::init_logging;
use puch::{RedServer, Shutdown};

#[derive(Parser)]
#[command(name = "red")]
#[command(about = "Downstream service protecting its upstream with a circuit breaker", long_about = None)]
struct Cli {
    #[command(flatten)]
    service: ServiceArgs,

    /// Base URL of the green service.
    #[arg(long, env = "UPSTREAM_URL")]
    upstream_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut cli = Cli::parse();
    cli.service = cli.service.with_legacy_env();

    let mut config: RedConfig = load_or_default(cli.service.config.as_deref())?;
    cli.service.apply(&mut config.service, &mut config.listener);
    if let Some(url) = cli.upstream_url {
        config.upstream.base_url = url;
    }
    config.validate().map_err(ConfigError::Validation)?;

    init_logging(&config.observability)?;

    tracing::info!(
        service = %config.service.name,
        environment = %config.service.environment,
        tracing_endpoint = config.service.tracing_endpoint.as_deref().unwrap_or("-"),
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.url(),
        breaker = %config.breaker.name,
        failure_threshold = config.breaker.failure_threshold,
        open_timeout_secs = config.breaker.open_timeout_secs,
        latency_budget_ms = config.breaker.latency_budget_ms,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let shutdown = Shutdown::new();

    RedServer::new(config)?
        .run(listener, shutdown.subscribe())
        .await?;

    tracing::info!("red stopped");
    Ok(())
}
