//! Command-line interface for strictly_onchain.

use clap::{Parser, Subcommand};

/// Strictly Onchain - tic-tac-toe against a ledger-backed house
#[derive(Parser, Debug)]
#[command(name = "strictly_onchain")]
#[command(about = "Play tic-tac-toe whose moves settle on a ledger", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play interactively, reading "column row" lines from stdin
    Play {
        /// Play against the in-process house instead of the gateway
        #[arg(long)]
        offline: bool,

        /// Resume an existing game instead of starting one
        #[arg(long)]
        game: Option<u32>,
    },

    /// Fetch and print the authoritative state of a game
    State {
        /// Game id
        #[arg(long)]
        game: u32,
    },

    /// Decode a shape-tagged raw board, e.g. '{"shape":"packed","data":"0x10"}'
    Decode {
        /// Raw board JSON
        json: String,

        /// Game id used to filter history logs
        #[arg(long, default_value = "0")]
        game: u32,
    },
}
