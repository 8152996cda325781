// src/bin/coordinator.rs

//! The coordinator binary (spec.md §6). CLI surface:
//!
//! Required: `--client-port <u16>`, `--peer-port <u16>`, `--config <path>`.
//! Optional: `--detector-timeout-secs <u64>` (default 3), `--log-path <path>`.

use anyhow::{bail, Context, Result};
use ringstore::config::ClusterTopology;
use ringstore::core::coordinator::{self, LocalProcessLauncher};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

struct Args {
    client_port: u16,
    peer_port: u16,
    config_path: String,
    detector_timeout: Duration,
}

fn parse_args() -> Result<Args> {
    let mut client_port = None;
    let mut peer_port = None;
    let mut config_path = None;
    let mut detector_timeout_secs = 3u64;

    let mut it = env::args().skip(1);
    while let Some(flag) = it.next() {
        let mut next = || it.next().with_context(|| format!("{flag} requires a value"));
        match flag.as_str() {
            "--client-port" => client_port = Some(next()?.parse::<u16>()?),
            "--peer-port" => peer_port = Some(next()?.parse::<u16>()?),
            "--config" => config_path = Some(next()?),
            "--detector-timeout-secs" => detector_timeout_secs = next()?.parse::<u64>()?,
            "--log-path" => {
                let _ = next()?; // accepted for parity with the server binary; logs go to stdout.
            }
            other => bail!("unrecognized flag: {other}"),
        }
    }

    Ok(Args {
        client_port: client_port.context("--client-port is required")?,
        peer_port: peer_port.context("--peer-port is required")?,
        config_path: config_path.context("--config is required")?,
        detector_timeout: Duration::from_secs(detector_timeout_secs),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args()?;
    let topology = ClusterTopology::from_file(&args.config_path)?;

    let binary_path = env::current_exe()
        .context("resolving own executable path")?
        .parent()
        .context("executable has no parent directory")?
        .join("ringstore-server");
    let launcher = Arc::new(LocalProcessLauncher::new(
        binary_path.to_string_lossy().into_owned(),
    ));

    coordinator::run(
        topology,
        args.client_port,
        args.peer_port,
        args.detector_timeout,
        launcher,
        "127.0.0.1".to_string(),
    )
    .await
}
