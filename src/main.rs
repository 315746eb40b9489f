//! btc-handshake binary: dial a node, run the version/verack handshake
//! once, report the elapsed time.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use btc_handshake::config::HandshakeConfig;
use btc_handshake::error::Result;
use btc_handshake::protocol::{HandshakeCore, MessageGenerator};
use btc_handshake::transport::{BoxedConnection, Connector, PeerClient};

#[derive(Parser, Debug)]
#[command(name = "btc-handshake", version, about = "Perform a Bitcoin P2P handshake against a node")]
struct Cli {
    /// Host of the blockchain node
    #[arg(long = "node.host", default_value = "127.0.0.1")]
    host: String,

    /// Port of the blockchain node
    #[arg(long = "node.port", default_value_t = 18333)]
    port: u16,

    /// Optional TOML configuration file
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Override the handshake deadline, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
        EnvFilter::new(format!("btc_handshake={level}"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("app starting");
    match run(cli).await {
        Ok(elapsed) => {
            info!("all necessary messages for connection are received");
            info!(ms = elapsed.as_millis() as u64, "handshake took {} ms", elapsed.as_millis());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "error while doing handshake");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<Duration> {
    let mut config = match &cli.config {
        Some(path) => HandshakeConfig::from_file(path)?,
        None => HandshakeConfig::from_env()?,
    };
    if let Some(ms) = cli.timeout_ms {
        config.handshake_timeout = Duration::from_millis(ms);
    }
    config.validate_strict()?;

    info!(host = %cli.host, port = cli.port, "connecting to bitcoin node");
    let connector: Connector = Box::new(|host, port| {
        Box::pin(async move {
            let stream = TcpStream::connect((host.as_str(), port)).await?;
            Ok(Box::new(stream) as BoxedConnection)
        })
    });
    let client = Arc::new(PeerClient::connect(cli.host, cli.port, connector).await?);

    let generator =
        MessageGenerator::new(config.protocol_version, config.services, &config.user_agent);
    let core = HandshakeCore::new(client, generator, &config);

    // One token governs the receive loop and the handshake waits; it fires
    // on SIGINT or when the deadline elapses.
    let token = CancellationToken::new();

    let interrupt_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("got interrupt signal");
            interrupt_token.cancel();
        }
    });

    let deadline_token = token.clone();
    let deadline = config.handshake_timeout;
    tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        deadline_token.cancel();
    });

    info!("starting reading incoming messages from node");
    core.start_receiver(&token);

    info!("starting handshake");
    let elapsed = core.handshake(&token).await;

    // stop the receive loop regardless of outcome
    token.cancel();
    elapsed
}
