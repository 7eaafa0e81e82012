//! # gremlin-console
//!
//! Runs Gremlin scripts against a server and prints each result as one
//! JSON line. Scripts come from the command line, or from stdin (one per
//! line) when none are given.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use gremlin_client::GremlinClient;
use gremlin_settings::GremlinSettings;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

/// Gremlin Server script runner.
#[derive(Parser, Debug)]
#[command(name = "gremlin-console", about = "Run Gremlin scripts against a server")]
struct Cli {
    /// Scripts to evaluate, in order. Read from stdin when omitted.
    scripts: Vec<String>,

    /// Settings file (defaults to `~/.gremlin/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Server host (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Server port (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Endpoint path (overrides settings).
    #[arg(long)]
    path: Option<String>,

    /// Connect with `wss://`.
    #[arg(long)]
    ssl: bool,

    /// Log filter (overrides settings; `RUST_LOG` wins over both).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// Seconds to wait for each script's final response.
    #[arg(long, default_value = "30")]
    timeout_secs: u64,
}

impl Cli {
    fn load_settings(&self) -> Result<GremlinSettings> {
        let mut settings = match &self.settings {
            Some(path) => gremlin_settings::load_settings_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => gremlin_settings::load_settings().context("Failed to load settings")?,
        };
        self.apply_overrides(&mut settings);
        Ok(settings)
    }

    fn apply_overrides(&self, settings: &mut GremlinSettings) {
        if let Some(host) = &self.host {
            settings.connection.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.connection.port = port;
        }
        if let Some(path) = &self.path {
            settings.connection.path.clone_from(path);
        }
        if self.ssl {
            settings.connection.ssl = true;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

async fn read_stdin_scripts() -> Result<Vec<String>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut scripts = Vec::new();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if !line.is_empty() {
            scripts.push(line.to_owned());
        }
    }
    Ok(scripts)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.load_settings()?;

    if args.json_logs {
        gremlin_core::logging::init_json_subscriber(&settings.logging.level);
    } else {
        gremlin_core::logging::init_subscriber(&settings.logging.level);
    }

    let scripts = if args.scripts.is_empty() {
        read_stdin_scripts().await?
    } else {
        args.scripts.clone()
    };
    if scripts.is_empty() {
        bail!("no scripts to run");
    }

    let client = GremlinClient::connect(&settings)
        .await
        .context("Failed to start driver")?;
    info!(url = %settings.connection.url()?, scripts = scripts.len(), "running scripts");

    let limit = Duration::from_secs(args.timeout_secs);
    let mut failures = 0usize;
    for script in &scripts {
        match tokio::time::timeout(limit, client.execute(script.as_str())).await {
            Ok(Ok(results)) => {
                for value in results {
                    println!("{}", serde_json::to_string(&value)?);
                }
            }
            Ok(Err(e)) => {
                error!(%script, error = %e, "script failed");
                failures += 1;
            }
            Err(_) => {
                let cause = client.last_error().await?.map(|e| e.to_string());
                error!(%script, timeout_secs = args.timeout_secs, ?cause, "timed out waiting for response");
                failures += 1;
            }
        }
    }

    client.close().await?;
    if failures > 0 {
        bail!("{failures} of {} scripts failed", scripts.len());
    }
    Ok(())
}
