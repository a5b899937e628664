//! Command-line arguments.  Flags override the config file, which
//! overrides the built-in defaults.

use clap::{Parser, Subcommand};

use chameleon::config::{Config, Transport};

#[derive(Debug, Parser)]
#[command(name = "chameleon", about = "Dynamic tool-execution MCP server", version)]
pub struct CliArgs {
    /// Transport type (stdio or sse).
    #[arg(long, value_enum)]
    pub transport: Option<TransportArg>,

    /// Host for the SSE transport.
    #[arg(long)]
    pub host: Option<String>,

    /// Port for the SSE transport.
    #[arg(long)]
    pub port: Option<u16>,

    /// Logging level (DEBUG, INFO, WARNING, ERROR, CRITICAL).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Directory for log files.
    #[arg(long)]
    pub logs_dir: Option<String>,

    /// Metadata database URL.
    #[arg(long)]
    pub metadata_database_url: Option<String>,

    /// Data database URL.
    #[arg(long)]
    pub data_database_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum TransportArg {
    Stdio,
    Sse,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the MCP server (the default when no subcommand is given).
    Serve,
    /// Seed both databases with the sample catalogue and data.
    Seed,
}

impl CliArgs {
    /// Fold the flags into a loaded configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(transport) = self.transport {
            config.server.transport = match transport {
                TransportArg::Stdio => Transport::Stdio,
                TransportArg::Sse => Transport::Sse,
            };
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(level) = &self.log_level {
            config.server.log_level = level.clone();
        }
        if let Some(dir) = &self.logs_dir {
            config.server.logs_dir = dir.clone();
        }
        if let Some(url) = &self.metadata_database_url {
            config.metadata_database.url = url.clone();
        }
        if let Some(url) = &self.data_database_url {
            config.data_database.url = url.clone();
        }
    }
}
