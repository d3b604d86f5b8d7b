//! QueueStack - local SQS-compatible queue service

mod config;
mod router;

use clap::Parser;
use queuestack_sqs::{CallerContext, LimitsHandle, SqsService, SqsState};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "queuestack")]
#[command(about = "Local SQS-compatible queue service", long_about = None)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "QUEUESTACK_PORT")]
    port: Option<u16>,

    /// Host to bind to (overrides the config file)
    #[arg(long, env = "QUEUESTACK_HOST")]
    host: Option<String>,

    /// Region queues are created in
    #[arg(long, env = "QUEUESTACK_REGION")]
    region: Option<String>,

    /// Account requests are served as
    #[arg(long, env = "QUEUESTACK_ACCOUNT_ID")]
    account_id: Option<String>,

    /// Configuration file, without extension
    #[arg(long, default_value = "queuestack", env = "QUEUESTACK_CONFIG")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "QUEUESTACK_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "queuestack={level},queuestack_sqs={level},tower_http=debug",
                    level = args.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = config::Config::load(&args.config)?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(region) = args.region {
        config.sqs.region = region;
    }
    let account_id = match args.account_id {
        Some(account_id) => account_id,
        None => config
            .sqs
            .accounts
            .first()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no accounts configured"))?,
    };
    if !config.sqs.accounts.contains(&account_id) {
        config.sqs.accounts.push(account_id.clone());
    }

    let limits = Arc::new(LimitsHandle::default());
    limits.apply(
        config
            .sqs
            .limits
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str())),
    )?;

    let endpoint = config
        .sqs
        .endpoint
        .clone()
        .unwrap_or_else(|| format!("http://localhost:{}", config.server.port));

    info!("Starting QueueStack...");
    info!(
        endpoint = %endpoint,
        region = %config.sqs.region,
        account_id = %account_id,
        "SQS service configured"
    );

    let service = SqsService::ephemeral(
        &endpoint,
        &config.sqs.region,
        config.sqs.accounts.iter().cloned(),
        limits,
    );
    let caller =
        CallerContext::new(account_id, config.sqs.region.clone()).privileged(config.sqs.privileged);
    let app = router::create_router(Arc::new(SqsState::new(service, caller)));

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
