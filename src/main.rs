//! # Guardrail CLI (`rail`)
//!
//! The `rail` binary is the primary interface for Guardrail. It provides
//! commands for constrained JSON generation, offline grammar validation,
//! and starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! rail --config ./config/rail.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rail generate "<prompt>"` | Generate a JSON value from a prompt |
//! | `rail check [TOKEN]...` | Validate a token sequence against the grammar |
//! | `rail serve` | Start the HTTP generation server |
//!
//! ## Examples
//!
//! ```bash
//! # Constrained generation against the configured provider
//! rail generate "Describe a person with name and age as JSON"
//!
//! # Cap the token budget for this request
//! rail generate "List three colors as a JSON array" --max-tokens 32
//!
//! # Offline grammar check (no provider required)
//! rail check '{' '"name"' ':' '"Ada"' '}'
//! echo '[ 1 , 2 ]' | rail check
//!
//! # Start the HTTP adapter
//! rail serve --config ./config/rail.toml
//! ```

mod check;
mod config;
mod driver;
mod filter;
mod gen_cmd;
mod grammar;
mod models;
mod provider;
mod server;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Guardrail CLI — grammar-constrained JSON generation for language models.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rail.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rail",
    about = "Guardrail — grammar-constrained JSON generation for language models",
    version,
    long_about = "Guardrail queries a token-prediction source one token at a time, keeps only \
    candidates that leave the output a prefix of well-formed JSON, renormalizes their \
    probabilities, and commits the best one until the value is complete."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/rail.toml`. Provider, generation, and server
    /// settings are read from this file.
    #[arg(long, global = true, default_value = "./config/rail.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Generate a JSON value from a prompt.
    ///
    /// Queries the configured token provider one token at a time until the
    /// output is a syntactically complete JSON value. The generated text is
    /// printed to stdout; an incomplete result (budget exhausted or no
    /// valid continuation) still prints the partial text and exits nonzero.
    Generate {
        /// The prompt to generate from.
        prompt: String,

        /// Accepted-token budget (overrides generation.max_tokens).
        #[arg(long)]
        max_tokens: Option<usize>,
    },

    /// Validate a token sequence against the JSON grammar.
    ///
    /// Feeds each token through the grammar state machine, reporting
    /// accept/reject per token plus a final completeness verdict. Reads
    /// whitespace-separated tokens from stdin when none are given. Runs
    /// fully offline; no provider or config file required.
    Check {
        /// Tokens to validate, in order.
        tokens: Vec<String>,
    },

    /// Start the HTTP generation server.
    ///
    /// Binds to the address configured in `[server].bind` and exposes
    /// `POST /generate` and `GET /health`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Check { tokens } = &cli.command {
        check::run_check(tokens)?;
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Generate { prompt, max_tokens } => {
            gen_cmd::run_generate(&cfg, &prompt, max_tokens).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Check { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
