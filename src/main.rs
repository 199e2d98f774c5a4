//! tracepair - service binary
//!
//! ```text
//! tracepair [-v...] api      [--bind ADDR] [--no-latency]
//! tracepair [-v...] database [--bind ADDR] [--no-latency]
//! ```

use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};
use tracepair::config::{ServiceConfig, ServiceKind};
use tracepair::{api_app, database_app, telemetry, APP_NAME, APP_VERSION};

// =============================================================================
// CLI
// =============================================================================

/// Upstream/downstream user services with a fault catalog
#[derive(Parser, Debug)]
#[command(name = APP_NAME)]
#[command(about = "Upstream/downstream user services for exercising tracing pipelines")]
#[command(version)]
struct Cli {
    /// Enable verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the upstream api service
    Api(ServeArgs),
    /// Run the downstream database service
    Database(ServeArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Listen address (defaults to 0.0.0.0:$PORT)
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Disable simulated latency
    #[arg(long)]
    no_latency: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let (kind, args) = match cli.command {
        Command::Api(args) => (ServiceKind::Api, args),
        Command::Database(args) => (ServiceKind::Database, args),
    };

    let mut config = ServiceConfig::from_env(kind)?;
    if args.no_latency {
        config.simulate_latency = false;
    }

    telemetry::init_logging(cli.verbose, config.debug);
    tracing::info!("{} v{}", APP_NAME, APP_VERSION);
    telemetry::log_banner(&config);

    let app = match kind {
        ServiceKind::Api => api_app(&config)?,
        ServiceKind::Database => database_app(&config).await,
    };

    let addr = args.bind.unwrap_or_else(|| config.bind_addr());
    tracing::info!("Starting {} service on {}", kind, addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
