use anyhow::{Context, Result};
use chatdoc::{api, completion::OpenAiClient, config, logging, service};
use clap::Parser;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

const PORT_RANGE: std::ops::RangeInclusive<u16> = 8000..=8099;

/// Relay chat messages to an LLM provider and summarize uploaded documents.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,
    /// Port to bind; overrides `SERVER_PORT`.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::init_config().context("failed to load configuration")?;
    logging::init_tracing();

    let client = OpenAiClient::from_config(&config).context("failed to build completion client")?;
    let service = service::AssistantService::new(Arc::new(client), (&config).into());
    let app = api::create_router(Arc::new(service));

    let (listener, port) = bind_listener(cli.host, cli.port.or(config.server_port)).await?;
    tracing::info!("Listening on http://{}:{}", cli.host, port);
    axum::serve(listener, app)
        .await
        .context("HTTP server terminated unexpectedly")?;
    Ok(())
}

async fn bind_listener(host: IpAddr, port: Option<u16>) -> Result<(TcpListener, u16)> {
    if let Some(port) = port {
        let listener = TcpListener::bind((host, port))
            .await
            .with_context(|| format!("failed to bind {host}:{port}"))?;
        return Ok((listener, port));
    }

    for port in PORT_RANGE {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err).with_context(|| format!("failed to bind {host}:{port}")),
        }
    }

    anyhow::bail!(
        "No available port found in range {}-{}",
        PORT_RANGE.start(),
        PORT_RANGE.end()
    )
}
