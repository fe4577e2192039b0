//! Demo server for request-scoped logging.
//!
//! ```text
//! request-logging --bind 127.0.0.1:8000
//! curl -H 'X-Request-ID: 999-888-777' localhost:8000/items/5?q=somequery
//! ```
//!
//! Logging is configured from an optional TOML file, then `LOG_LEVEL`,
//! `LOG_FORMAT`, `LOG_STREAM` and `RUST_LOG`.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use request_logging::config;
use request_logging::http::HttpServer;
use request_logging::observability::init_logging;

#[derive(Parser)]
#[command(name = "request-logging")]
#[command(about = "Demo HTTP server with request-scoped structured logging", long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8000")]
    bind: String,

    /// Logging configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = config::load(cli.config.as_deref())?;
    init_logging(&config);

    tracing::info!(
        level = %config.level,
        format = %config.format,
        "request-logging v0.1.0 starting"
    );

    let listener = TcpListener::bind(&cli.bind).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    HttpServer::new().run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
