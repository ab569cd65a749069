//! CLI command definitions for the `testhook` binary.
//!
//! Uses clap derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use testhook_types::config::GlobalConfig;

/// Serve test webhooks that fire once and then disarm.
#[derive(Parser)]
#[command(name = "testhook", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the TOML config file (default: ./testhook.toml).
    #[arg(long, global = true, env = "TESTHOOK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Address to bind (overrides `[server] host`).
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides `[server] port`).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the effective configuration as TOML.
    Config,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

impl Cli {
    /// Default log filter for the requested verbosity.
    pub fn default_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "info",
            1 => "info,testhook=debug",
            _ => "trace",
        }
    }
}

/// Apply `serve` flag overrides on top of the loaded config.
pub fn apply_overrides(config: &mut GlobalConfig, host: Option<String>, port: Option<u16>) {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
}
