//! Digital Ethics Monitor server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http (request id, trace, limits)
//!                        │
//!                        ▼
//!                     service::admit
//!                        token → live role → authorize → rate limit
//!                        │
//!                        ▼
//!                     business operation ──▶ FieldCipher (sensitive fields)
//!                        │
//!                        ▼
//!                     Store unit of work  (record + AuditLedger entry)
//!                        │
//!     Client Response    ▼
//!     ◀────────────── http error mapping
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use ethics_monitor::config::{load_config, load_from_env, ConfigError, MonitorConfig};
use ethics_monitor::lifecycle::{self, signals};
use ethics_monitor::observability::{logging, metrics};
use ethics_monitor::security::{FieldCipher, SystemClock, TokenService};
use ethics_monitor::service::MonitorService;

#[derive(Parser)]
#[command(name = "ethics-monitor", version, about = "Digital Ethics Monitor server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve {
        /// TOML configuration file. Environment variables only when absent.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print a signed session token. The server re-reads the role from the
    /// store on every request, so the principal must exist there.
    IssueToken {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        principal: String,
        #[arg(long)]
        role: String,
        /// Lifetime in seconds; the configured TTL when omitted.
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
    /// Verify every audit record in the configured store.
    VerifyAudit {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print a fresh base64 field-encryption key.
    GenerateKey,
}

fn load(path: Option<&PathBuf>) -> Result<MonitorConfig, ConfigError> {
    match path {
        Some(p) => load_config(p),
        None => load_from_env(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config } => {
            let config = load(config.as_ref())?;
            logging::init_logging(&config.observability);
            tracing::info!(version = env!("CARGO_PKG_VERSION"), "ethics-monitor starting");

            if config.observability.metrics_enabled {
                match config.observability.metrics_address.parse() {
                    Ok(addr) => metrics::init_metrics(addr),
                    Err(_) => tracing::error!(
                        metrics_address = %config.observability.metrics_address,
                        "Failed to parse metrics address"
                    ),
                }
            }

            let running = lifecycle::start(&config).await?;
            running.run_until(signals::wait_for_termination()).await?;
            tracing::info!("Shutdown complete");
        }
        Command::IssueToken { config, principal, role, ttl_secs } => {
            let config = load(config.as_ref())?;
            let ttl = ttl_secs.unwrap_or(config.auth.token_ttl_secs);
            let ttl = chrono::Duration::seconds(i64::try_from(ttl)?.min(i64::MAX / 1000));
            let tokens = TokenService::new(config.auth.jwt_secret.as_bytes(), Arc::new(SystemClock));
            println!("{}", tokens.issue(&principal, &role, ttl)?.token);
        }
        Command::VerifyAudit { config } => {
            let config = load(config.as_ref())?;
            logging::init_logging(&config.observability);
            let service = MonitorService::from_config(&config)?;
            let report = service.integrity_check();
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_intact() {
                std::process::exit(1);
            }
        }
        Command::GenerateKey => {
            println!("{}", FieldCipher::generate_key());
        }
    }
    Ok(())
}
