//! Strictly Onchain - Unified CLI
//!
//! Play against the house through the ledger gateway or offline, inspect
//! authoritative game state, and decode raw boards.

#![warn(missing_docs)]

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use strictly_ledger::{GameId, Ledger, RawBoard, Reconciler, decode, rules};
use strictly_onchain::{Cli, Command, GatewayLedger, HouseLedger, PlayLoop, SyncConfig};
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = SyncConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    init_tracing(&config);

    match cli.command {
        Command::Play { offline, game } => run_play(config, offline, game).await,
        Command::State { game } => run_state(config, game).await,
        Command::Decode { json, game } => run_decode(&json, game),
    }
}

fn init_tracing(config: &SyncConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Run the interactive play loop
#[instrument(skip(config))]
async fn run_play(config: SyncConfig, offline: bool, game: Option<GameId>) -> Result<()> {
    if offline {
        info!("Playing offline against the in-process house");
        let ledger = HouseLedger::new(config.player_identity(), config.contract_address());
        play_with(Arc::new(ledger), config, game).await
    } else {
        info!(gateway = %config.gateway_url(), "Playing through the ledger gateway");
        let ledger = GatewayLedger::new(&config).context("Failed to create gateway client")?;
        play_with(Arc::new(ledger), config, game).await
    }
}

async fn play_with<L: Ledger>(
    ledger: Arc<L>,
    config: SyncConfig,
    game: Option<GameId>,
) -> Result<()> {
    let house = config.contract_address().clone();
    let reconciler = match game {
        Some(game_id) => Reconciler::open(ledger, game_id, house)
            .await
            .with_context(|| format!("Failed to open game {}", game_id))?,
        None => Reconciler::start(ledger, config.player_identity().clone(), house)
            .await
            .context("Failed to start a game")?,
    };

    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    PlayLoop::new(reconciler, config).run(input, &mut stdout).await
}

/// Fetch and print the authoritative state of a game
#[instrument(skip(config))]
async fn run_state(config: SyncConfig, game: GameId) -> Result<()> {
    let ledger = GatewayLedger::new(&config).context("Failed to create gateway client")?;
    let state = ledger
        .fetch_authoritative_state(game)
        .await
        .context("Failed to fetch game state")?;
    let decoded = decode(&state.raw_board, game).context("Failed to decode board")?;

    println!("Game {}", game);
    println!("Player: {}", state.player_identity);
    println!(
        "Winner: {}",
        state.winner_identity.as_deref().unwrap_or("none")
    );
    println!("Moves made: {}", state.total_moves_made);
    println!(
        "Turn: {}",
        if state.is_player_turn { "player" } else { "house" }
    );
    println!("{}", decoded.board.display());
    for warning in &decoded.warnings {
        println!("warning: {}", warning);
    }
    Ok(())
}

/// Decode a raw board given on the command line
fn run_decode(json: &str, game: GameId) -> Result<()> {
    let raw = RawBoard::from_json(json).context("Failed to parse raw board")?;
    let decoded = decode(&raw, game).context("Failed to decode board")?;
    let outcome = rules::evaluate(&decoded.board).context("Failed to evaluate board")?;

    println!("{}", decoded.board.display());
    println!("Outcome: {}", outcome);
    for warning in &decoded.warnings {
        println!("warning: {}", warning);
    }
    Ok(())
}
