//! Line-oriented play loop.
//!
//! Reads `column row` moves (or a cell label) and the commands `new`,
//! `refresh` and `quit`. While the house owes a reply the loop polls the
//! ledger at the configured interval.

use crate::config::SyncConfig;
use anyhow::{Context, Result};
use std::io::Write;
use strictly_ledger::{
    Actor, BoardView, Cell, Ledger, Phase, Position, Reconciler, Snapshot, SyncError, Transition,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// One parsed input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// Claim a cell.
    Move(Position),
    /// Start another game after this one ends.
    NewGame,
    /// Reload from the ledger.
    Refresh,
    /// Leave the loop.
    Quit,
}

impl Input {
    /// Parses a line, or `None` if it is not understood.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_lowercase().as_str() {
            "" => None,
            "quit" | "q" | "exit" => Some(Input::Quit),
            "new" | "n" => Some(Input::NewGame),
            "refresh" | "r" => Some(Input::Refresh),
            other => Position::parse(other).map(Input::Move),
        }
    }
}

/// Renders a snapshot: board, winning line, status line and tally.
///
/// An unconfirmed player move is drawn as lowercase `x`.
pub fn render(snapshot: &Snapshot) -> String {
    let pending = match snapshot.view() {
        BoardView::Projected(projection) => Some(projection.player_move().position),
        BoardView::Committed(_) => None,
    };
    let board = snapshot.view().board();

    let mut out = format!("Game {}\n", snapshot.game_id());
    for row in 0..3u64 {
        let cells: Vec<String> = (0..3u64)
            .filter_map(|column| Position::from_coords(column, row))
            .map(|pos| match board.get(pos) {
                Cell::Occupied(Actor::Player) if Some(pos) == pending => "x".to_string(),
                Cell::Occupied(actor) => actor.mark().to_string(),
                Cell::Empty => ".".to_string(),
            })
            .collect();
        out.push_str(&cells.join(" "));
        out.push('\n');
    }
    if let Some(line) = snapshot.winning_line() {
        let cells: Vec<String> = line.iter().map(ToString::to_string).collect();
        out.push_str(&format!("Winning line: {}\n", cells.join(", ")));
    }
    out.push_str(snapshot.status());
    out.push('\n');
    out.push_str(&snapshot.tally().to_string());
    out.push('\n');
    out
}

/// Drives a [`Reconciler`] from line input until `quit` or end of input.
pub struct PlayLoop<L> {
    reconciler: Reconciler<L>,
    config: SyncConfig,
}

impl<L: Ledger> PlayLoop<L> {
    /// Creates a loop over `reconciler`.
    pub fn new(reconciler: Reconciler<L>, config: SyncConfig) -> Self {
        Self { reconciler, config }
    }

    /// The driven reconciler.
    pub fn reconciler(&self) -> &Reconciler<L> {
        &self.reconciler
    }

    /// Runs until `quit` or end of input.
    #[instrument(skip_all, fields(game_id = self.reconciler.game_id()))]
    pub async fn run<R, W>(&self, input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        info!("Starting play loop");
        let mut lines = input.lines();
        self.show(out)?;

        while let Some(line) = lines.next_line().await.context("Failed to read input")? {
            let Some(command) = Input::parse(&line) else {
                writeln!(out, "Enter \"column row\", a cell label, new, refresh or quit")?;
                continue;
            };
            debug!(?command, "Input received");

            match command {
                Input::Quit => break,
                Input::Refresh => self.refresh(out).await?,
                Input::NewGame => match self.reconciler.rematch().await {
                    Ok(game_id) => info!(game_id, "New game"),
                    Err(e) => self.report(&e, out)?,
                },
                Input::Move(position) => {
                    if let Err(e) = self.play_move(position, out).await? {
                        self.report(&e, out)?;
                        if e.requires_reload() {
                            self.refresh(out).await?;
                        }
                    }
                    if self.reconciler.current_phase() == Phase::AwaitingHouseOutcome
                        && !self.reconciler.reload_required()
                    {
                        self.await_house(out).await?;
                    }
                }
            }
            self.show(out)?;
        }

        info!(tally = %self.reconciler.score_tally(), "Play loop finished");
        Ok(())
    }

    /// Plays one move, drawing the projected board while the ledger answers.
    async fn play_move<W: Write>(
        &self,
        position: Position,
        out: &mut W,
    ) -> Result<Result<Transition, SyncError>> {
        let mut snapshots = self.reconciler.subscribe();
        snapshots.mark_unchanged();
        let played = self
            .reconciler
            .play(u64::from(position.column()), u64::from(position.row()));
        tokio::pin!(played);

        loop {
            tokio::select! {
                result = &mut played => return Ok(result),
                Ok(()) = snapshots.changed() => {
                    let snapshot = snapshots.borrow_and_update().clone();
                    if snapshot.view().is_projected() {
                        write!(out, "{}", render(&snapshot))?;
                        out.flush()?;
                    }
                }
            }
        }
    }

    fn show<W: Write>(&self, out: &mut W) -> Result<()> {
        let snapshot = self.reconciler.snapshot();
        for warning in snapshot.warnings() {
            writeln!(out, "warning: {}", warning)?;
        }
        write!(out, "{}", render(&snapshot))?;
        out.flush()?;
        Ok(())
    }

    fn report<W: Write>(&self, error: &SyncError, out: &mut W) -> Result<()> {
        warn!(%error, kind = %error.kind(), "Move not applied");
        writeln!(out, "{}", error.status())?;
        Ok(())
    }

    async fn refresh<W: Write>(&self, out: &mut W) -> Result<()> {
        if let Err(e) = self.reconciler.refresh().await {
            self.report(&e, out)?;
        }
        Ok(())
    }

    /// Polls until the house reply lands or the poll budget runs out.
    async fn await_house<W: Write>(&self, out: &mut W) -> Result<()> {
        for attempt in 1..=*self.config.max_refresh_polls() {
            sleep(self.config.poll_interval()).await;
            match self.reconciler.refresh().await {
                Ok(_) if self.reconciler.current_phase() != Phase::AwaitingHouseOutcome => {
                    debug!(attempt, "House reply observed");
                    return Ok(());
                }
                Ok(_) => debug!(attempt, "House reply not settled yet"),
                Err(e) => warn!(attempt, error = %e, "Poll failed"),
            }
        }
        warn!("House reply did not arrive");
        writeln!(out, "The house has not replied yet; type refresh to check again")?;
        Ok(())
    }
}
