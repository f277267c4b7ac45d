// src/bin/nila-rp.rs

//! Line-oriented front end: reads one JSON command per line on stdin and
//! writes one JSON response per line on stdout. Logs go to stderr.
//!
//! Usage: `nila-rp [config.yaml]`, log level via `RUST_LOG` (default `info`).

use nila_rp::prelude::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from {}", path);
            Config::from_yaml_file(&path)?
        }
        None => Config::default(),
    };
    let ctx = Context::with_defaults(config)?;
    info!("nila-rp ready, reading commands from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Option<Command>>(line) {
            Ok(command) => process(command.as_ref(), &ctx).await,
            Err(e) => {
                error!("Failed to parse command: {}", e);
                CommandResponse::error(&NilaRpError::InvalidParams(e.to_string()))
            }
        };
        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }
    Ok(())
}
