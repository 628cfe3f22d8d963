//! The `scheduler` module progresses every tracked game on a bounded pool of workers.

use crate::types::GameMetadata;
use ethers::types::Address;
use futures::future::join_all;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

mod coordinator;
use coordinator::Coordinator;

mod types;
pub use types::{DiskManager, PlayerCreator, SchedulerError};

mod worker;

/// Configuration of the [Scheduler].
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of games progressed concurrently.
    pub max_concurrency: usize,
    /// How often resolved games' data is reclaimed.
    pub prune_interval: Duration,
    /// Games whose data is never reclaimed.
    pub protected_games: Vec<Address>,
}

/// The [GameScheduler] trait accepts the latest set of games to play.
pub trait GameScheduler: Send + Sync {
    /// Replaces the set of tracked games. Returns [SchedulerError::Busy] if the previous update
    /// has not been picked up yet.
    fn schedule(&self, games: Vec<GameMetadata>) -> Result<(), SchedulerError>;
}

/// The [Scheduler] runs the coordinator loop and its workers.
pub struct Scheduler {
    schedule_tx: mpsc::Sender<Vec<GameMetadata>>,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Starts the coordinator and `max_concurrency` workers. They stop when `shutdown` is
    /// cancelled or [Scheduler::close] is called.
    pub fn start(
        creator: Arc<dyn PlayerCreator>,
        disk: Arc<dyn DiskManager>,
        config: SchedulerConfig,
        shutdown: &CancellationToken,
    ) -> Self {
        let cancel = shutdown.child_token();
        let max_concurrency = config.max_concurrency.max(1);
        let (job_tx, job_rx) = mpsc::channel(max_concurrency * 2);
        let (result_tx, result_rx) = mpsc::channel(max_concurrency * 2);
        let (schedule_tx, schedule_rx) = mpsc::channel(1);

        let job_rx = Arc::new(Mutex::new(job_rx));
        let mut handles: Vec<JoinHandle<()>> = (0..max_concurrency)
            .map(|_| {
                tokio::spawn(worker::progress_games(
                    Arc::clone(&job_rx),
                    result_tx.clone(),
                    cancel.clone(),
                ))
            })
            .collect();

        let coordinator = Coordinator::new(
            job_tx,
            result_rx,
            creator,
            disk,
            &config.protected_games,
        );
        handles.push(tokio::spawn(run(
            coordinator,
            schedule_rx,
            config.prune_interval,
            cancel.clone(),
        )));
        tracing::info!(
            target: "scheduler",
            "Scheduler started with {} workers",
            max_concurrency
        );

        Self {
            schedule_tx,
            cancel,
            handles,
        }
    }

    /// Stops the coordinator and workers and waits for them to exit.
    pub async fn close(self) {
        self.cancel.cancel();
        join_all(self.handles).await;
        tracing::info!(target: "scheduler", "Scheduler stopped");
    }
}

impl GameScheduler for Scheduler {
    fn schedule(&self, games: Vec<GameMetadata>) -> Result<(), SchedulerError> {
        self.schedule_tx.try_send(games).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SchedulerError::Busy,
            mpsc::error::TrySendError::Closed(_) => SchedulerError::Stopped,
        })
    }
}

async fn run(
    mut coordinator: Coordinator,
    mut schedule_rx: mpsc::Receiver<Vec<GameMetadata>>,
    prune_interval: Duration,
    cancel: CancellationToken,
) {
    let mut prune = interval_at(Instant::now() + prune_interval, prune_interval);
    prune.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            Some(games) = schedule_rx.recv() => {
                if let Err(e) = coordinator.schedule(games, &cancel).await {
                    tracing::warn!(target: "scheduler", "Failed to schedule games: {:#}", e);
                }
            }
            Some(job) = coordinator.next_result() => coordinator.process_result(job),
            _ = prune.tick() => coordinator.prune(),
        }
    }
}
