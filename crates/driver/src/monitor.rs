//! The `monitor` module polls the factory for games and hands them to the scheduler.

use crate::{
    contracts::GameSource,
    scheduler::{GameScheduler, SchedulerError},
    types::GameMetadata,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::{providers::Middleware, types::Address};
use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// The [L1HeadSource] trait supplies the current L1 head.
#[async_trait]
pub trait L1HeadSource: Send + Sync {
    /// Returns the number of the latest L1 block.
    async fn latest_block_number(&self) -> Result<u64>;
}

/// An [L1HeadSource] backed by an ethers client.
pub struct ClientHeadSource<M>(pub Arc<M>);

#[async_trait]
impl<M: Middleware + 'static> L1HeadSource for ClientHeadSource<M> {
    async fn latest_block_number(&self) -> Result<u64> {
        let block = self
            .0
            .get_block_number()
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))
            .context("failed to load L1 head")?;
        Ok(block.as_u64())
    }
}

/// The [GameMonitor] periodically lists the games in scope and schedules them.
pub struct GameMonitor {
    source: Arc<dyn GameSource>,
    l1: Arc<dyn L1HeadSource>,
    poll_interval: Duration,
    game_window: Duration,
    allowlist: Vec<Address>,
    game_type: u8,
}

impl GameMonitor {
    /// Creates a new [GameMonitor] for games of type `game_type`.
    pub fn new(
        source: Arc<dyn GameSource>,
        l1: Arc<dyn L1HeadSource>,
        poll_interval: Duration,
        game_window: Duration,
        allowlist: Vec<Address>,
        game_type: u8,
    ) -> Self {
        Self {
            source,
            l1,
            poll_interval,
            game_window,
            allowlist,
            game_type,
        }
    }

    /// Polls until `cancel` is cancelled. Failed polls are logged and retried on the next tick.
    pub async fn run(&self, scheduler: &dyn GameScheduler, cancel: CancellationToken) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            target: "game-monitor",
            "Monitoring games every {:?}",
            self.poll_interval
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(target: "game-monitor", "Game monitor stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.progress_games(scheduler).await {
                        tracing::error!(
                            target: "game-monitor",
                            "Failed to progress games: {:#}",
                            e
                        );
                    }
                }
            }
        }
    }

    /// Lists the games in scope at the current L1 head and schedules them.
    pub async fn progress_games(&self, scheduler: &dyn GameScheduler) -> Result<()> {
        let block = self.l1.latest_block_number().await?;
        let games = self
            .source
            .fetch_all_games_at_block(self.min_game_timestamp(), block)
            .await
            .context("failed to load games")?;
        let games: Vec<GameMetadata> = games
            .into_iter()
            .filter(|game| self.in_scope(game))
            .collect();
        tracing::debug!(
            target: "game-monitor",
            "Found {} games in scope at L1 block {}",
            games.len(),
            block
        );

        match scheduler.schedule(games) {
            Ok(()) => Ok(()),
            Err(SchedulerError::Busy) => {
                tracing::info!(target: "game-monitor", "Scheduler busy, skipping game update");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn in_scope(&self, game: &GameMetadata) -> bool {
        if !self.allowlist.is_empty() && !self.allowlist.contains(&game.proxy) {
            tracing::debug!(
                target: "game-monitor",
                "Skipping game {:?} not on allowlist",
                game.proxy
            );
            return false;
        }
        if game.game_type != self.game_type {
            tracing::debug!(
                target: "game-monitor",
                "Skipping game {:?} of unsupported type {}",
                game.proxy,
                game.game_type
            );
            return false;
        }
        true
    }

    fn min_game_timestamp(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        now.saturating_sub(self.game_window).as_secs()
    }
}
