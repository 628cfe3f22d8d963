//! The `player` module drives a single game from discovery until it resolves.

use crate::{
    agent::Agent,
    contracts::{FaultDisputeGameContract, GameContract},
    responder::FaultResponder,
    scheduler::PlayerCreator,
    txmgr::TxManager,
    types::{GameMetadata, GameStatus},
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use dispute_challenger_solvers::fault::{
    trace::{TraceAccessor, TraceProvider},
    GameSolver,
};
use ethers::{
    providers::Middleware,
    types::{Address, H256},
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;

/// The [GamePlayer] trait is the unit of work handed to the scheduler's workers.
#[async_trait]
pub trait GamePlayer: Send {
    /// Takes the next actions in the game and returns its status afterwards.
    async fn progress_game(&mut self) -> GameStatus;
    /// Returns the last known status of the game.
    fn status(&self) -> GameStatus;
}

/// Errors that prevent a player from taking part in a game.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// Our trace does not start from the game's absolute prestate.
    #[error("absolute prestate does not match. Provider: {provider:?}, contract: {contract:?}")]
    PrestateMismatch {
        /// The commitment computed by our trace provider.
        provider: H256,
        /// The commitment recorded in the game contract.
        contract: H256,
    },
}

/// The [GameValidator] trait checks that a game can be played with our trace before any action
/// is taken.
#[async_trait]
pub trait GameValidator: Send + Sync {
    /// Fails if the game is incompatible with our trace.
    async fn validate(&self, contract: &dyn GameContract) -> Result<()>;
}

/// Compares the absolute prestate of a [TraceProvider] with the one recorded on-chain.
pub struct PrestateValidator {
    provider: Arc<dyn TraceProvider>,
}

impl PrestateValidator {
    /// Creates a new [PrestateValidator].
    pub fn new(provider: Arc<dyn TraceProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl GameValidator for PrestateValidator {
    async fn validate(&self, contract: &dyn GameContract) -> Result<()> {
        let provider = self
            .provider
            .absolute_prestate_commitment()
            .await
            .context("failed to get the provider's absolute prestate")?;
        let onchain = contract.get_absolute_prestate_hash().await?;
        if provider != onchain {
            return Err(PlayerError::PrestateMismatch {
                provider,
                contract: onchain,
            }
            .into());
        }
        Ok(())
    }
}

/// The [ResourceCreator] trait builds the trace and validator for a game of one trace type.
#[async_trait]
pub trait ResourceCreator: Send + Sync {
    /// Creates the [TraceAccessor] and [GameValidator] for the game at `game`. `dir` is the
    /// game's private data directory.
    async fn create(
        &self,
        game: Address,
        contract: Arc<dyn GameContract>,
        game_depth: u64,
        dir: &Path,
    ) -> Result<(TraceAccessor, Box<dyn GameValidator>)>;
}

/// The [FaultGamePlayer] plays a single fault dispute game.
pub struct FaultGamePlayer {
    /// `None` when the game was already resolved at creation.
    agent: Option<Agent>,
    loader: Arc<dyn GameContract>,
    agree_with_proposed_output: bool,
    status: GameStatus,
    game: Address,
}

impl FaultGamePlayer {
    /// Creates a new [FaultGamePlayer]. Games that have already resolved get a player that never
    /// acts. Otherwise the game's absolute prestate must match our trace.
    pub async fn new(
        game: Address,
        loader: Arc<dyn GameContract>,
        tx_mgr: Arc<dyn TxManager>,
        creator: &dyn ResourceCreator,
        dir: &Path,
        agree_with_proposed_output: bool,
    ) -> Result<Self> {
        let status = loader
            .get_status()
            .await
            .context("failed to fetch game status")?;
        if status.is_terminal() {
            tracing::info!(
                target: "game-player",
                "Game {:?} already resolved with status: {}",
                game,
                status
            );
            return Ok(Self {
                agent: None,
                loader,
                agree_with_proposed_output,
                status,
                game,
            });
        }

        let game_depth = loader
            .get_max_game_depth()
            .await
            .context("failed to fetch the game depth")?;
        let (accessor, validator) = creator
            .create(game, Arc::clone(&loader), game_depth, dir)
            .await
            .context("failed to create trace accessor")?;
        validator
            .validate(loader.as_ref())
            .await
            .context("failed to validate absolute prestate")?;

        let responder = Arc::new(FaultResponder::new(tx_mgr, Arc::clone(&loader)));
        let agent = Agent::new(
            GameSolver::new(game_depth, accessor),
            Arc::clone(&loader),
            responder,
            game_depth,
            agree_with_proposed_output,
            game,
        );
        Ok(Self {
            agent: Some(agent),
            loader,
            agree_with_proposed_output,
            status,
            game,
        })
    }

    async fn log_game_status(&self, status: GameStatus) {
        if status == GameStatus::InProgress {
            match self.loader.get_claim_count().await {
                Ok(claims) => tracing::info!(
                    target: "game-player",
                    "Game {:?} info. Claims: {}, status: {}",
                    self.game,
                    claims,
                    status
                ),
                Err(e) => tracing::error!(
                    target: "game-player",
                    "Failed to get claim count for game {:?}: {:#}",
                    self.game,
                    e
                ),
            }
            return;
        }

        let expected = if self.agree_with_proposed_output {
            GameStatus::ChallengerWon
        } else {
            GameStatus::DefenderWon
        };
        if status == expected {
            tracing::info!(target: "game-player", "Game {:?} won. Status: {}", self.game, status);
        } else {
            tracing::error!(target: "game-player", "Game {:?} lost. Status: {}", self.game, status);
        }
    }
}

#[async_trait]
impl GamePlayer for FaultGamePlayer {
    async fn progress_game(&mut self) -> GameStatus {
        // Terminal statuses never revert, so resolved games need no further reads.
        if self.status.is_terminal() {
            tracing::debug!(target: "game-player", "Skipping completed game {:?}", self.game);
            return self.status;
        }
        if let Some(agent) = &self.agent {
            if let Err(e) = agent.act().await {
                tracing::error!(
                    target: "game-player",
                    "Error when acting on game {:?}: {:#}",
                    self.game,
                    e
                );
            }
        }

        match self.loader.get_status().await {
            Ok(status) => {
                self.log_game_status(status).await;
                self.status = status;
                status
            }
            Err(e) => {
                tracing::warn!(
                    target: "game-player",
                    "Unable to retrieve status of game {:?}: {:#}",
                    self.game,
                    e
                );
                GameStatus::InProgress
            }
        }
    }

    fn status(&self) -> GameStatus {
        self.status
    }
}

/// Creates [FaultGamePlayer]s for newly discovered games.
pub struct FaultPlayerCreator<M> {
    client: Arc<M>,
    tx_mgr: Arc<dyn TxManager>,
    resources: Arc<dyn ResourceCreator>,
    agree_with_proposed_output: bool,
}

impl<M: Middleware + 'static> FaultPlayerCreator<M> {
    /// Creates a new [FaultPlayerCreator].
    pub fn new(
        client: Arc<M>,
        tx_mgr: Arc<dyn TxManager>,
        resources: Arc<dyn ResourceCreator>,
        agree_with_proposed_output: bool,
    ) -> Self {
        Self {
            client,
            tx_mgr,
            resources,
            agree_with_proposed_output,
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> PlayerCreator for FaultPlayerCreator<M> {
    async fn create_player(
        &self,
        game: &GameMetadata,
        dir: PathBuf,
    ) -> Result<Box<dyn GamePlayer>> {
        let contract: Arc<dyn GameContract> = Arc::new(FaultDisputeGameContract::new(
            game.proxy,
            Arc::clone(&self.client),
        ));
        let player = FaultGamePlayer::new(
            game.proxy,
            contract,
            Arc::clone(&self.tx_mgr),
            self.resources.as_ref(),
            &dir,
            self.agree_with_proposed_output,
        )
        .await?;
        Ok(Box::new(player))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{StubGameContract, StubTxManager, TxOutcome};
    use dispute_challenger_solvers::fault::trace::AlphabetTraceProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MAX_DEPTH: u64 = 3;

    #[derive(Default)]
    struct AlphabetResources {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ResourceCreator for AlphabetResources {
        async fn create(
            &self,
            _game: Address,
            _contract: Arc<dyn GameContract>,
            game_depth: u64,
            _dir: &Path,
        ) -> Result<(TraceAccessor, Box<dyn GameValidator>)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let provider: Arc<dyn TraceProvider> =
                Arc::new(AlphabetTraceProvider::new("abcdefgh", game_depth));
            Ok((
                TraceAccessor::simple(Arc::clone(&provider)),
                Box::new(PrestateValidator::new(provider)),
            ))
        }
    }

    async fn alphabet_prestate() -> H256 {
        AlphabetTraceProvider::new("abcdefgh", MAX_DEPTH)
            .absolute_prestate_commitment()
            .await
            .unwrap()
    }

    async fn player(
        contract: Arc<StubGameContract>,
        resources: &AlphabetResources,
    ) -> Result<FaultGamePlayer> {
        FaultGamePlayer::new(
            contract.address,
            contract,
            Arc::new(StubTxManager::new(TxOutcome::Success)),
            resources,
            Path::new("/nonexistent"),
            false,
        )
        .await
    }

    #[tokio::test]
    async fn resolved_game_gets_no_op_player() {
        let contract = Arc::new(StubGameContract::new(MAX_DEPTH, vec![]));
        contract.set_status(Some(GameStatus::ChallengerWon));
        let resources = AlphabetResources::default();

        let mut player = player(contract.clone(), &resources).await.unwrap();
        assert_eq!(player.status(), GameStatus::ChallengerWon);
        assert_eq!(player.progress_game().await, GameStatus::ChallengerWon);
        assert_eq!(resources.calls.load(Ordering::SeqCst), 0);
        assert_eq!(contract.status_reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn prestate_mismatch_prevents_creation() {
        let contract = Arc::new(StubGameContract::new(MAX_DEPTH, vec![]));
        *contract.prestate.lock().unwrap() = H256::repeat_byte(0xba);
        let resources = AlphabetResources::default();

        let err = player(contract, &resources).await.err().unwrap();
        assert!(matches!(
            err.downcast_ref::<PlayerError>(),
            Some(PlayerError::PrestateMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn progress_reports_fetched_status() {
        let contract = Arc::new(StubGameContract::new(MAX_DEPTH, vec![]));
        *contract.prestate.lock().unwrap() = alphabet_prestate().await;
        let resources = AlphabetResources::default();
        let mut player = player(contract.clone(), &resources).await.unwrap();

        assert_eq!(player.progress_game().await, GameStatus::InProgress);
        contract.set_status(Some(GameStatus::DefenderWon));
        assert_eq!(player.progress_game().await, GameStatus::DefenderWon);
        assert_eq!(player.status(), GameStatus::DefenderWon);
    }

    #[tokio::test]
    async fn status_read_failure_reports_in_progress() {
        let contract = Arc::new(StubGameContract::new(MAX_DEPTH, vec![]));
        *contract.prestate.lock().unwrap() = alphabet_prestate().await;
        let resources = AlphabetResources::default();
        let mut player = player(contract.clone(), &resources).await.unwrap();

        contract.set_status(None);
        assert_eq!(player.progress_game().await, GameStatus::InProgress);
        assert_eq!(player.status(), GameStatus::InProgress);
    }

    #[tokio::test]
    async fn terminal_status_is_never_reverted() {
        let contract = Arc::new(StubGameContract::new(MAX_DEPTH, vec![]));
        *contract.prestate.lock().unwrap() = alphabet_prestate().await;
        let resources = AlphabetResources::default();
        let mut player = player(contract.clone(), &resources).await.unwrap();

        contract.set_status(Some(GameStatus::ChallengerWon));
        assert_eq!(player.progress_game().await, GameStatus::ChallengerWon);
        contract.set_status(Some(GameStatus::InProgress));
        assert_eq!(player.progress_game().await, GameStatus::ChallengerWon);
    }
}
