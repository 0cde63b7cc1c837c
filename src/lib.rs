//! Strictly Onchain - tic-tac-toe against a ledger-backed house
//!
//! The board lives on a ledger; this client keeps a local view in step with
//! it through [`strictly_ledger`].
//!
//! # Architecture
//!
//! - **Config**: TOML settings with an environment override for the gateway
//! - **Gateway**: [`Ledger`](strictly_ledger::Ledger) over the HTTP gateway
//! - **House**: in-process [`Ledger`](strictly_ledger::Ledger) for offline play
//! - **Play**: stdin play loop with house polling
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strictly_onchain::{HouseLedger, PlayLoop, SyncConfig};
//! use strictly_ledger::Reconciler;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = SyncConfig::default();
//! let ledger = Arc::new(HouseLedger::new("0xa11ce", "0xc0ffee"));
//! let reconciler = Reconciler::start(ledger, "0xa11ce", "0xc0ffee").await?;
//! let play = PlayLoop::new(reconciler, config);
//! let input = tokio::io::BufReader::new(tokio::io::stdin());
//! play.run(input, &mut std::io::stdout()).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod cli;
mod config;
mod gateway;
mod house;
mod play;

// Crate-level exports - CLI
pub use cli::{Cli, Command};

// Crate-level exports - Configuration
pub use config::{ConfigError, GATEWAY_URL_ENV, SyncConfig};

// Crate-level exports - Ledgers
pub use gateway::GatewayLedger;
pub use house::{HouseLedger, pick_move};

// Crate-level exports - Play loop
pub use play::{Input, PlayLoop, render};
