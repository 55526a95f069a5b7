//! CLI command definitions and dispatch for the `speedcal` binary.
//!
//! Uses clap derive macros for argument parsing. Day-to-day use is
//! `speedcal serve`; the other commands manage API keys and inspect setup.

pub mod check;
pub mod key;
pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Calendar assistant server: chat sessions, streaming turns and schedule tools.
#[derive(Parser)]
#[command(name = "speedcal", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory (config.toml, speedcal.db). Defaults to $SPEEDCAL_HOME or ~/.speedcal.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log directive for the chosen verbosity. `RUST_LOG` overrides it.
    pub fn log_directive(&self) -> &'static str {
        match self.verbose {
            0 => "warn,speedcal_api=info",
            1 => "info,speedcal=debug,tower_http=debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on (defaults to `server.port` in config.toml).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to `server.host` in config.toml).
        #[arg(long)]
        host: Option<String>,
    },

    /// Manage API keys (create, list, revoke).
    Key {
        #[command(subcommand)]
        action: key::KeyCommand,
    },

    /// Send a one-off request to the configured model endpoint.
    Check,

    /// Show configuration and storage status.
    Status,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::parse_from(["speedcal", "serve", "--port", "9000", "--data-dir", "/tmp/x"]);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));
        match cli.command {
            Commands::Serve { port, host } => {
                assert_eq!(port, Some(9000));
                assert!(host.is_none());
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_parse_key_create() {
        let cli = Cli::parse_from(["speedcal", "key", "create", "--user", "u-1", "--name", "phone"]);
        match cli.command {
            Commands::Key {
                action: key::KeyCommand::Create { user, name },
            } => {
                assert_eq!(user, "u-1");
                assert_eq!(name, "phone");
            }
            _ => panic!("expected key create"),
        }
    }

    #[test]
    fn test_verbosity_directive() {
        let cli = Cli::parse_from(["speedcal", "-vv", "status"]);
        assert_eq!(cli.log_directive(), "trace");
    }
}
