mod server;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use watchparty_core::{logging, Config};

use server::WatchPartyServer;

/// Real-time co-viewing room server.
#[derive(Debug, Parser)]
#[command(name = "watchparty", version, about)]
struct Cli {
    /// Path to a TOML/YAML/JSON config file. Environment variables
    /// (`WATCHPARTY_...`) override it.
    #[arg(short, long, env = "WATCHPARTY_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = Config::load(cli.config.as_deref())?;

    // 2. Validate (fail fast on misconfiguration)
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    // 3. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("WatchParty server starting...");
    info!("HTTP address: {}", config.http_address());

    WatchPartyServer::new(config).start().await
}
