//! Command-line argument definitions for the Stencil CLI.
//!
//! [`Args`] holds the global options (configuration file, log level) and
//! one [`Command`]: `render`, `fmt` or `tokens`.

use clap::{Parser, Subcommand};

/// Command-line arguments for the Stencil template tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a template
    Render(RenderArgs),

    /// Print a template in canonical form
    Fmt(FmtArgs),

    /// Print the tokens of a template
    Tokens(TokensArgs),
}

#[derive(clap::Args, Debug)]
pub struct RenderArgs {
    /// Path to the input template
    pub input: String,

    /// Path to the output file; stdout when omitted
    #[arg(short, long)]
    pub output: Option<String>,

    /// Variables file (`.json` or `.toml`)
    #[arg(long)]
    pub vars: Option<String>,

    /// Set a variable; the value is read as JSON, or as a string otherwise
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(String, String)>,
}

#[derive(clap::Args, Debug)]
pub struct FmtArgs {
    /// Path to the input template
    pub input: String,

    /// Exit with an error status when the file is not formatted
    #[arg(long, conflicts_with = "write")]
    pub check: bool,

    /// Rewrite the file in place
    #[arg(short, long)]
    pub write: bool,
}

#[derive(clap::Args, Debug)]
pub struct TokensArgs {
    /// Path to the input template
    pub input: String,
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got \"{raw}\"")),
    }
}
