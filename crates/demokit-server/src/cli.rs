//! Command line interface

use crate::error::ServerError;
use clap::{Parser, Subcommand};
use demokit_core::DemoConfig;
use std::net::SocketAddr;
use std::path::PathBuf;

/// demokit command line
#[derive(Debug, Parser)]
#[command(
    name = "demokit",
    version,
    about = "Serve fixtures in place of a real backend",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Config file (TOML); built-in defaults apply without one
    #[arg(long, short, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the demo proxy
    Serve {
        /// Listen address (overrides the config)
        #[arg(long, value_name = "ADDR")]
        listen: Option<SocketAddr>,
    },

    /// Load the fixture files and list their keys
    Check,

    /// Resolve one key against the fixtures
    Resolve {
        /// Operation name (demo name with --mutation)
        key: String,

        /// Arguments as JSON
        #[arg(long, value_name = "JSON")]
        args: Option<String>,

        /// Scenario to resolve under
        #[arg(long, value_name = "NAME")]
        scenario: Option<String>,

        /// Look up a mutation instead of a query
        #[arg(long)]
        mutation: bool,
    },
}

impl Cli {
    /// Configuration: file (if given), then `DEMOKIT_*` overrides
    ///
    /// # Errors
    /// Returns `ServerError::Demo` when the file or an override is invalid.
    pub fn load_config(&self) -> Result<DemoConfig, ServerError> {
        let config = match &self.config {
            Some(path) => DemoConfig::from_file(path)?,
            None => DemoConfig::new(),
        };
        let config = config.with_env()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_resolve() {
        let cli = Cli::try_parse_from([
            "demokit",
            "resolve",
            "createOrder",
            "--mutation",
            "--args",
            r#"{"sku":"42"}"#,
            "--config",
            "demo.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("demo.toml")));
        match cli.command {
            Command::Resolve {
                key, args, mutation, ..
            } => {
                assert_eq!(key, "createOrder");
                assert!(mutation);
                assert_eq!(args.as_deref(), Some(r#"{"sku":"42"}"#));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_serve_listen() {
        let cli = Cli::try_parse_from(["demokit", "serve", "--listen", "0.0.0.0:8080"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Serve { listen: Some(addr) } if addr.port() == 8080
        ));
    }
}
