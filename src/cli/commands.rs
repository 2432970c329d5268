//! CLI command definitions using clap.
//!
//! - ask: answer one request
//! - chat: interactive session with history
//! - tools: list the tool catalog
//! - check-config: validate configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Toolpilot - route natural-language requests to remote tools
#[derive(Parser, Debug)]
#[command(name = "toolpilot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a single request
    Ask {
        /// The request, in plain language
        #[arg(required = true, num_args = 1..)]
        utterance: Vec<String>,

        /// Notes to include as user context
        #[arg(short, long)]
        notes: Option<String>,

        /// Skip the cosmetic oracle pass over the rendered result
        #[arg(long)]
        no_polish: bool,
    },

    /// Interactive session (/tools, /reload, /quit)
    Chat {
        /// Notes to include as user context
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// List available tools
    Tools {
        /// Only show tools owned by this provider
        #[arg(short, long)]
        provider: Option<String>,
    },

    /// Load and validate the configuration
    CheckConfig,
}

impl Commands {
    /// The utterance for `ask`, joined from its words
    pub fn utterance(&self) -> Option<String> {
        match self {
            Commands::Ask { utterance, .. } => Some(utterance.join(" ")),
            _ => None,
        }
    }
}
