//! Command-line interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Documentation agent server for component libraries
#[derive(Parser, Debug)]
#[command(name = "docent", version, about = "Session-scoped documentation agent")]
pub struct Cli {
    /// TOML configuration file (also read from DOCENT_CONFIG)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Model override (format: provider:model, e.g. openai:gpt-4o)
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve(ServeArgs),
    /// Ask a single question and stream the answer to stdout
    Ask(AskArgs),
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Address to bind, overriding configuration
    #[arg(short, long)]
    pub bind: Option<String>,
}

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Session id to ask as
    #[arg(short, long, default_value = "cli")]
    pub user: String,

    /// The question
    pub question: String,
}

impl Cli {
    /// The subcommand to run; `serve` when none was given.
    pub fn command(self) -> Commands {
        self.command
            .unwrap_or_else(|| Commands::Serve(ServeArgs::default()))
    }
}
