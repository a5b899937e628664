use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use chameleon::{Config, Engine, seed};

mod cli_args;
mod logging;
mod server;
mod transport;

use cli_args::{CliArgs, Commands};
use server::ChameleonServer;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Defaults, then config file, then flags.
    let mut config = Config::load();
    config.fill_database_defaults();
    args.apply_to(&mut config);

    logging::setup_logging(&config.server.log_level, &config.server.logs_dir)?;
    tracing::info!("server starting up...");
    tracing::info!("transport: {:?}", config.server.transport);
    tracing::info!("metadata database: {}", config.metadata_database.url);
    tracing::info!("data database: {}", config.data_database.url);

    match args.command {
        Some(Commands::Seed) => run_seed(&config),
        Some(Commands::Serve) | None => run_serve(&config).await,
    }
}

/// Bootstrap both databases with the sample catalogue; any failure is a
/// seeding failure and exits nonzero.
fn run_seed(config: &Config) -> Result<()> {
    let engine = Engine::from_config(config).context("opening metadata database")?;
    seed::seed_all(&engine).context("seeding databases")?;
    let tools = engine
        .list_tools("default")
        .context("listing seeded tools")?;
    tracing::info!("seeding complete: {} tool(s) registered", tools.len());
    for tool in &tools {
        tracing::info!("  - {}", tool.name);
    }
    Ok(())
}

async fn run_serve(config: &Config) -> Result<()> {
    // Metadata store failure is fatal; data store failure starts offline.
    let engine = Arc::new(Engine::from_config(config).context("opening metadata database")?);

    if seed::is_catalogue_empty(&engine)? {
        tracing::info!("metadata database is empty, seeding with sample data...");
        seed::seed_all(&engine).context("auto-seeding empty database")?;
        tracing::info!("database seeding completed");
    }

    let handler = ChameleonServer::new(engine);
    match config.server.transport {
        chameleon::config::Transport::Stdio => transport::serve_stdio(handler).await,
        chameleon::config::Transport::Sse => {
            transport::serve_sse(handler, &config.server.host, config.server.port).await
        }
    }
}
