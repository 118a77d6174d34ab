//! Chain reaction turn server.
//!
//! Usage: cargo run -p chain_reaction_web --bin chain-reaction-server -- --help

use chain_reaction_web::config::{load_with_sources, ConfigOverrides, LogFormat};
use chain_reaction_web::{init_logging, WebServer};
use clap::Parser;
use std::path::PathBuf;

/// Serves the chain reaction board and runs the engine after every human move.
///
/// Each option can also come from a TOML file (`--config` or
/// `CHAIN_REACTION_CONFIG`) or a `CHAIN_REACTION_<NAME>` variable;
/// command-line values win.
#[derive(Debug, Parser)]
#[command(name = "chain-reaction-server", version, about)]
struct ServerArgs {
    /// TOML configuration file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
    /// Address to bind (default 127.0.0.1)
    #[arg(long)]
    host: Option<String>,
    /// Port to bind (default 3001)
    #[arg(long, short = 'p')]
    port: Option<u16>,
    /// Directory holding the state file; the engine runs here
    #[arg(long)]
    state_dir: Option<PathBuf>,
    /// State file name inside the state directory (default input.txt)
    #[arg(long)]
    state_file: Option<String>,
    /// Engine executable (default game_engine_ai)
    #[arg(long)]
    engine: Option<PathBuf>,
    /// Argument passed to the engine; repeat for several
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    engine_args: Vec<String>,
    /// Engine wall-clock limit in milliseconds (default 10000)
    #[arg(long)]
    engine_timeout_ms: Option<u64>,
    /// Let the engine make the first move of every game
    #[arg(long)]
    engine_first: bool,
    /// Log output format: text or json
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl ServerArgs {
    fn into_overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            config_file: self.config,
            host: self.host,
            port: self.port,
            state_dir: self.state_dir,
            state_file: self.state_file,
            engine_path: self.engine,
            engine_args: (!self.engine_args.is_empty()).then_some(self.engine_args),
            engine_timeout_ms: self.engine_timeout_ms,
            engine_first: self.engine_first.then_some(true),
            log_format: self.log_format,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ServerArgs::parse();
    let resolved = load_with_sources(args.into_overrides())?;
    let config = resolved.config;

    init_logging(config.log_format)?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        state = %config.state_path().display(),
        engine = %config.resolved_engine_path().display(),
        engine_timeout_ms = config.engine_timeout_ms,
        engine_first = config.engine_first,
        sources = ?resolved.sources,
        "starting chain reaction server"
    );

    let server = WebServer::new(config)?;
    let handle = server.start().await?;
    tracing::info!(addr = %handle.address(), "server running; press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;

    tracing::info!("shutting down server");
    handle.shutdown().await?;
    tracing::info!("server stopped cleanly");

    Ok(())
}
