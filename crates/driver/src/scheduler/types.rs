use crate::{
    player::GamePlayer,
    types::{GameMetadata, GameStatus},
};
use anyhow::Result;
use async_trait::async_trait;
use ethers::types::Address;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by [Scheduler::schedule](super::Scheduler::schedule).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// The previous update has not been picked up yet.
    #[error("scheduler busy")]
    Busy,
    /// The scheduler has shut down.
    #[error("scheduler stopped")]
    Stopped,
}

/// A game handed to a worker. The job owns the game's player until the result is returned, so
/// a game can only ever be progressed by one worker at a time.
pub(crate) struct Job {
    pub(crate) address: Address,
    pub(crate) player: Box<dyn GamePlayer>,
    pub(crate) status: GameStatus,
}

/// The [PlayerCreator] trait builds the player for a newly discovered game.
#[async_trait]
pub trait PlayerCreator: Send + Sync {
    /// Creates the player for `game`, using `dir` for any data it needs to store.
    async fn create_player(&self, game: &GameMetadata, dir: PathBuf) -> Result<Box<dyn GamePlayer>>;
}

/// The [DiskManager] trait owns the per-game data directories.
pub trait DiskManager: Send + Sync {
    /// Returns the data directory of `game`, creating it if needed.
    fn dir_for_game(&self, game: Address) -> Result<PathBuf>;
    /// Deletes the data directory of every game not in `keep`.
    fn remove_all_except(&self, keep: &[Address]) -> Result<()>;
}
