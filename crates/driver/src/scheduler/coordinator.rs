use super::types::{DiskManager, Job, PlayerCreator};
use crate::{
    player::GamePlayer,
    types::{GameMetadata, GameStatus},
};
use anyhow::{anyhow, Result};
use ethers::types::Address;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// What the coordinator knows about a single game.
#[derive(Default)]
struct TrackedGame {
    /// `None` while the player is out on a job, or if it could not be created yet.
    player: Option<Box<dyn GamePlayer>>,
    inflight: bool,
    status: GameStatus,
}

/// The [Coordinator] owns every game's player and hands them to workers, one job per game at a
/// time.
pub(crate) struct Coordinator {
    job_tx: mpsc::Sender<Job>,
    result_rx: mpsc::Receiver<Job>,
    creator: Arc<dyn PlayerCreator>,
    disk: Arc<dyn DiskManager>,
    protected: HashSet<Address>,
    states: HashMap<Address, TrackedGame>,
    reclaim_pending: bool,
}

impl Coordinator {
    pub(crate) fn new(
        job_tx: mpsc::Sender<Job>,
        result_rx: mpsc::Receiver<Job>,
        creator: Arc<dyn PlayerCreator>,
        disk: Arc<dyn DiskManager>,
        protected: &[Address],
    ) -> Self {
        Self {
            job_tx,
            result_rx,
            creator,
            disk,
            protected: protected.iter().copied().collect(),
            states: HashMap::new(),
            // Directories left behind by a previous run are reclaimed on the first prune.
            reclaim_pending: true,
        }
    }

    /// Replaces the set of tracked games with `games` and enqueues a job for every game that
    /// does not already have one outstanding. Only fails if cancelled while enqueueing.
    pub(crate) async fn schedule(
        &mut self,
        games: Vec<GameMetadata>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let before = self.states.len();
        self.states
            .retain(|address, state| state.inflight || games.iter().any(|g| g.proxy == *address));
        if self.states.len() != before {
            self.reclaim_pending = true;
        }

        let mut jobs = Vec::new();
        for game in &games {
            match self.create_job(game).await {
                Ok(Some(job)) => jobs.push(job),
                Ok(None) => {}
                Err(e) => tracing::error!(
                    target: "scheduler",
                    "Failed to create player for game {:?}: {:#}",
                    game.proxy,
                    e
                ),
            }
        }

        for job in jobs {
            self.enqueue_job(job, cancel).await?;
        }
        Ok(())
    }

    async fn create_job(&mut self, game: &GameMetadata) -> Result<Option<Job>> {
        let state = self.states.entry(game.proxy).or_default();
        if state.inflight {
            tracing::debug!(
                target: "scheduler",
                "Not rescheduling already in-flight game {:?}",
                game.proxy
            );
            return Ok(None);
        }

        if state.player.is_none() {
            let dir = self.disk.dir_for_game(game.proxy)?;
            let player = self.creator.create_player(game, dir).await?;
            state.status = player.status();
            state.player = Some(player);
        }

        let Some(player) = state.player.take() else {
            return Ok(None);
        };
        state.inflight = true;
        Ok(Some(Job {
            address: game.proxy,
            player,
            status: state.status,
        }))
    }

    /// Waits for room in the job queue, recording results as they arrive so workers never
    /// block on a full result queue.
    async fn enqueue_job(&mut self, job: Job, cancel: &CancellationToken) -> Result<()> {
        let job_tx = self.job_tx.clone();
        loop {
            tokio::select! {
                permit = job_tx.reserve() => {
                    let permit = permit.map_err(|_| anyhow!("job queue closed"))?;
                    permit.send(job);
                    return Ok(());
                }
                Some(result) = self.result_rx.recv() => self.process_result(result),
                _ = cancel.cancelled() => {
                    return Err(anyhow!("cancelled while enqueueing game {:?}", job.address));
                }
            }
        }
    }

    /// Receives the next finished job.
    pub(crate) async fn next_result(&mut self) -> Option<Job> {
        self.result_rx.recv().await
    }

    /// Returns a finished job's player to its game and records the resulting status.
    pub(crate) fn process_result(&mut self, job: Job) {
        let Some(state) = self.states.get_mut(&job.address) else {
            tracing::error!(
                target: "scheduler",
                "Received result for untracked game {:?}",
                job.address
            );
            return;
        };
        state.inflight = false;
        state.player = Some(job.player);
        // Terminal statuses never revert.
        if !state.status.is_terminal() {
            state.status = job.status;
        }
        if state.status.is_terminal() && !self.protected.contains(&job.address) {
            tracing::debug!(
                target: "scheduler",
                "Game {:?} resolved with status {}, marking its data for reclamation",
                job.address,
                state.status
            );
            self.reclaim_pending = true;
        }
    }

    /// Deletes the data of every game that is resolved or no longer tracked, unless it is in
    /// flight or protected.
    pub(crate) fn prune(&mut self) {
        if !self.reclaim_pending {
            return;
        }
        let keep: HashSet<Address> = self
            .states
            .iter()
            .filter(|(_, state)| state.inflight || !state.status.is_terminal())
            .map(|(address, _)| *address)
            .chain(self.protected.iter().copied())
            .collect();
        let keep: Vec<Address> = keep.into_iter().collect();
        match self.disk.remove_all_except(&keep) {
            Ok(()) => self.reclaim_pending = false,
            Err(e) => tracing::error!(
                target: "disk-manager",
                "Unable to clean up game data: {:#}",
                e
            ),
        }
    }

    #[cfg(test)]
    fn status(&self, game: Address) -> Option<GameStatus> {
        self.states.get(&game).map(|state| state.status)
    }

    #[cfg(test)]
    fn is_inflight(&self, game: Address) -> bool {
        self.states.get(&game).map(|state| state.inflight).unwrap_or(false)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{game, PlayerOutcomes, StubDiskManager, StubPlayerCreator};

    struct Harness {
        coordinator: Coordinator,
        job_rx: mpsc::Receiver<Job>,
        result_tx: mpsc::Sender<Job>,
        creator: Arc<StubPlayerCreator>,
        disk: Arc<StubDiskManager>,
        cancel: CancellationToken,
    }

    fn harness(protected: &[Address]) -> Harness {
        let (job_tx, job_rx) = mpsc::channel(10);
        let (result_tx, result_rx) = mpsc::channel(10);
        let creator = Arc::new(StubPlayerCreator::new(Arc::new(PlayerOutcomes::default())));
        let disk = Arc::new(StubDiskManager::default());
        Harness {
            coordinator: Coordinator::new(
                job_tx,
                result_rx,
                creator.clone(),
                disk.clone(),
                protected,
            ),
            job_rx,
            result_tx,
            creator,
            disk,
            cancel: CancellationToken::new(),
        }
    }

    impl Harness {
        async fn schedule(&mut self, games: &[u8]) {
            let games = games.iter().map(|g| game(*g)).collect();
            self.coordinator.schedule(games, &self.cancel).await.unwrap();
        }

        fn drain_jobs(&mut self) -> Vec<Job> {
            let mut jobs = Vec::new();
            while let Ok(job) = self.job_rx.try_recv() {
                jobs.push(job);
            }
            jobs
        }

        fn finish(&mut self, mut job: Job, status: GameStatus) {
            job.status = status;
            self.coordinator.process_result(job);
        }
    }

    fn addr(id: u8) -> Address {
        game(id).proxy
    }

    #[tokio::test]
    async fn schedules_one_job_per_game() {
        let mut h = harness(&[]);
        h.schedule(&[1, 2, 3]).await;
        let jobs = h.drain_jobs();
        assert_eq!(jobs.len(), 3);
        assert!(h.coordinator.is_inflight(addr(1)));
        assert_eq!(h.disk.dirs(), vec![addr(1), addr(2), addr(3)]);
    }

    #[tokio::test]
    async fn in_flight_games_are_not_rescheduled() {
        let mut h = harness(&[]);
        h.schedule(&[1]).await;
        h.schedule(&[1]).await;
        assert_eq!(h.drain_jobs().len(), 1);
    }

    #[tokio::test]
    async fn players_are_reused_between_passes() {
        let mut h = harness(&[]);
        h.schedule(&[1]).await;
        let job = h.drain_jobs().pop().unwrap();
        h.finish(job, GameStatus::InProgress);
        assert!(!h.coordinator.is_inflight(addr(1)));

        h.schedule(&[1]).await;
        assert_eq!(h.drain_jobs().len(), 1);
        assert_eq!(h.creator.created(), vec![addr(1)]);
    }

    #[tokio::test]
    async fn failed_player_creation_is_retried() {
        let mut h = harness(&[]);
        h.creator.fail_once(addr(2));
        h.schedule(&[1, 2]).await;
        let jobs = h.drain_jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].address, addr(1));

        h.schedule(&[1, 2]).await;
        let jobs = h.drain_jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].address, addr(2));
    }

    #[tokio::test]
    async fn results_update_status() {
        let mut h = harness(&[]);
        h.schedule(&[1]).await;
        let mut job = h.drain_jobs().pop().unwrap();
        job.status = GameStatus::DefenderWon;
        h.result_tx.send(job).await.unwrap();

        let result = h.coordinator.next_result().await.unwrap();
        h.coordinator.process_result(result);
        assert_eq!(h.coordinator.status(addr(1)), Some(GameStatus::DefenderWon));
    }

    #[tokio::test]
    async fn terminal_status_is_kept() {
        let mut h = harness(&[]);
        h.schedule(&[1]).await;
        let job = h.drain_jobs().pop().unwrap();
        h.finish(job, GameStatus::ChallengerWon);

        h.schedule(&[1]).await;
        let job = h.drain_jobs().pop().unwrap();
        h.finish(job, GameStatus::InProgress);
        assert_eq!(h.coordinator.status(addr(1)), Some(GameStatus::ChallengerWon));
    }

    #[tokio::test]
    async fn prune_removes_resolved_and_dropped_games() {
        let mut h = harness(&[addr(9)]);
        h.schedule(&[1, 2, 3, 9]).await;
        let mut jobs = h.drain_jobs();
        assert_eq!(jobs.len(), 4);
        // Game 3 stays in flight.
        let _in_flight = jobs.remove(2);
        let game_9 = jobs.pop().unwrap();
        let game_2 = jobs.pop().unwrap();
        let game_1 = jobs.pop().unwrap();
        h.finish(game_1, GameStatus::InProgress);
        h.finish(game_2, GameStatus::DefenderWon);
        h.finish(game_9, GameStatus::DefenderWon);

        h.coordinator.prune();
        let mut kept = h.disk.last_kept().unwrap();
        kept.sort();
        assert_eq!(kept, vec![addr(1), addr(3), addr(9)]);

        // Nothing changed, so the next prune is skipped.
        h.coordinator.prune();
        assert_eq!(h.disk.prunes(), 1);

        // Game 1 leaves the window.
        h.schedule(&[3, 9]).await;
        h.coordinator.prune();
        let mut kept = h.disk.last_kept().unwrap();
        kept.sort();
        assert_eq!(kept, vec![addr(3), addr(9)]);
    }

    #[tokio::test]
    async fn in_flight_games_survive_leaving_the_window() {
        let mut h = harness(&[]);
        h.schedule(&[1]).await;
        let job = h.drain_jobs().pop().unwrap();
        h.schedule(&[]).await;
        assert!(h.coordinator.is_inflight(addr(1)));

        h.finish(job, GameStatus::InProgress);
        h.schedule(&[]).await;
        assert_eq!(h.coordinator.status(addr(1)), None);
    }

    #[tokio::test]
    async fn enqueue_stops_when_cancelled() {
        let (job_tx, _job_rx) = mpsc::channel(1);
        let (_result_tx, result_rx) = mpsc::channel(1);
        let creator = Arc::new(StubPlayerCreator::new(Arc::new(PlayerOutcomes::default())));
        let mut coordinator = Coordinator::new(
            job_tx,
            result_rx,
            creator,
            Arc::new(StubDiskManager::default()),
            &[],
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        // The first job fills the queue, the second can never be enqueued.
        let result = coordinator.schedule(vec![game(1), game(2)], &cancel).await;
        assert!(result.is_err());
    }
}
