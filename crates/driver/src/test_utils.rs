//! In-memory stand-ins for the on-chain collaborators of the driver.

use crate::{
    contracts::GameContract,
    player::GamePlayer,
    scheduler::{DiskManager, PlayerCreator},
    txmgr::{TxCandidate, TxError, TxManager},
    types::{GameMetadata, GameStatus},
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use dispute_challenger_solvers::fault::{Claim, ClaimData, PreimageOracleData};
use ethers::types::{Address, Bytes, TransactionReceipt, H256};
use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

/// An alphabet game created at timestamp `id` by a proxy filled with `id`.
pub(crate) fn game(id: u8) -> GameMetadata {
    GameMetadata {
        game_type: 255,
        timestamp: id as u64,
        proxy: Address::repeat_byte(id),
    }
}

/// How a [StubTxManager] answers every transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TxOutcome {
    Success,
    Revert,
    Fail,
}

/// A [TxManager] that records every candidate it is asked to send.
pub(crate) struct StubTxManager {
    outcome: TxOutcome,
    sent: Mutex<Vec<TxCandidate>>,
}

impl StubTxManager {
    pub(crate) fn new(outcome: TxOutcome) -> Self {
        Self {
            outcome,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn sent(&self) -> Vec<TxCandidate> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl TxManager for StubTxManager {
    async fn send(&self, candidate: TxCandidate) -> Result<TransactionReceipt, TxError> {
        self.sent.lock().unwrap().push(candidate);
        match self.outcome {
            TxOutcome::Success => Ok(TransactionReceipt::default()),
            TxOutcome::Revert => Err(TxError::Reverted {
                tx_hash: H256::repeat_byte(0xee),
            }),
            TxOutcome::Fail => Err(TxError::Send(anyhow!("connection refused"))),
        }
    }
}

/// A [GameContract] backed by in-memory state. Transactions are encoded as readable strings
/// so tests can compare them.
pub(crate) struct StubGameContract {
    pub(crate) address: Address,
    pub(crate) max_depth: u64,
    pub(crate) split_depth: u64,
    pub(crate) block_range: (u64, u64),
    pub(crate) prestate: Mutex<H256>,
    /// `None` makes status reads fail.
    pub(crate) status: Mutex<Option<GameStatus>>,
    /// `None` makes resolve simulations fail.
    pub(crate) resolve_status: Mutex<Option<GameStatus>>,
    pub(crate) claims: Mutex<Vec<ClaimData>>,
    pub(crate) status_reads: AtomicUsize,
}

impl StubGameContract {
    pub(crate) fn new(max_depth: u64, claims: Vec<ClaimData>) -> Self {
        Self {
            address: Address::repeat_byte(0x42),
            max_depth,
            split_depth: 0,
            block_range: (0, 0),
            prestate: Mutex::new(H256::zero()),
            status: Mutex::new(Some(GameStatus::InProgress)),
            resolve_status: Mutex::new(Some(GameStatus::InProgress)),
            claims: Mutex::new(claims),
            status_reads: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_status(&self, status: Option<GameStatus>) {
        *self.status.lock().unwrap() = status;
    }

    pub(crate) fn set_resolve_status(&self, status: Option<GameStatus>) {
        *self.resolve_status.lock().unwrap() = status;
    }

    fn tx(&self, data: String) -> TxCandidate {
        TxCandidate {
            to: self.address,
            tx_data: Bytes::from(data.into_bytes()),
            gas_limit: None,
        }
    }
}

#[async_trait]
impl GameContract for StubGameContract {
    async fn get_status(&self) -> Result<GameStatus> {
        self.status_reads.fetch_add(1, Ordering::SeqCst);
        self.status
            .lock()
            .unwrap()
            .ok_or(anyhow!("status unavailable"))
    }

    async fn get_claim_count(&self) -> Result<u64> {
        Ok(self.claims.lock().unwrap().len() as u64)
    }

    async fn get_max_game_depth(&self) -> Result<u64> {
        Ok(self.max_depth)
    }

    async fn get_split_depth(&self) -> Result<u64> {
        Ok(self.split_depth)
    }

    async fn get_absolute_prestate_hash(&self) -> Result<H256> {
        Ok(*self.prestate.lock().unwrap())
    }

    async fn get_block_range(&self) -> Result<(u64, u64)> {
        Ok(self.block_range)
    }

    async fn get_all_claims(&self) -> Result<Vec<ClaimData>> {
        Ok(self.claims.lock().unwrap().clone())
    }

    async fn call_resolve(&self) -> Result<GameStatus> {
        self.resolve_status
            .lock()
            .unwrap()
            .ok_or(anyhow!("resolve reverted"))
    }

    fn attack_tx(&self, parent_index: usize, pivot: Claim) -> Result<TxCandidate> {
        Ok(self.tx(format!("attack({},{:?})", parent_index, pivot)))
    }

    fn defend_tx(&self, parent_index: usize, pivot: Claim) -> Result<TxCandidate> {
        Ok(self.tx(format!("defend({},{:?})", parent_index, pivot)))
    }

    fn step_tx(
        &self,
        claim_index: usize,
        is_attack: bool,
        state_data: Bytes,
        proof: Bytes,
    ) -> Result<TxCandidate> {
        Ok(self.tx(format!(
            "step({},{},{},{})",
            claim_index, is_attack, state_data, proof
        )))
    }

    fn resolve_tx(&self) -> Result<TxCandidate> {
        Ok(self.tx("resolve()".to_string()))
    }

    async fn update_oracle_tx(&self, data: &PreimageOracleData) -> Result<TxCandidate> {
        Ok(self.tx(format!(
            "oracle({},{},{})",
            data.is_local, data.oracle_key, data.oracle_offset
        )))
    }
}

/// Shared script and observations for [StubPlayer]s.
#[derive(Default)]
pub(crate) struct PlayerOutcomes {
    /// The status each game reports after being progressed. Unlisted games stay in progress.
    statuses: Mutex<HashMap<Address, GameStatus>>,
    progressed: Mutex<HashMap<Address, usize>>,
    active: Mutex<HashSet<Address>>,
    /// Number of times a game was progressed while already being progressed.
    pub(crate) overlaps: AtomicUsize,
}

impl PlayerOutcomes {
    pub(crate) fn set_status(&self, game: Address, status: GameStatus) {
        self.statuses.lock().unwrap().insert(game, status);
    }

    pub(crate) fn progressed(&self, game: Address) -> usize {
        self.progressed.lock().unwrap().get(&game).copied().unwrap_or(0)
    }
}

/// A [GamePlayer] that follows the script in [PlayerOutcomes].
pub(crate) struct StubPlayer {
    address: Address,
    outcomes: Arc<PlayerOutcomes>,
    status: GameStatus,
}

#[async_trait]
impl GamePlayer for StubPlayer {
    async fn progress_game(&mut self) -> GameStatus {
        if !self.outcomes.active.lock().unwrap().insert(self.address) {
            self.outcomes.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.outcomes.active.lock().unwrap().remove(&self.address);

        *self
            .outcomes
            .progressed
            .lock()
            .unwrap()
            .entry(self.address)
            .or_default() += 1;
        self.status = self
            .outcomes
            .statuses
            .lock()
            .unwrap()
            .get(&self.address)
            .copied()
            .unwrap_or_default();
        self.status
    }

    fn status(&self) -> GameStatus {
        self.status
    }
}

/// A [PlayerCreator] that creates [StubPlayer]s and records which games it was asked for.
pub(crate) struct StubPlayerCreator {
    outcomes: Arc<PlayerOutcomes>,
    failing: Mutex<HashSet<Address>>,
    created: Mutex<Vec<Address>>,
}

impl StubPlayerCreator {
    pub(crate) fn new(outcomes: Arc<PlayerOutcomes>) -> Self {
        Self {
            outcomes,
            failing: Mutex::new(HashSet::new()),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Makes the next attempt to create a player for `game` fail.
    pub(crate) fn fail_once(&self, game: Address) {
        self.failing.lock().unwrap().insert(game);
    }

    pub(crate) fn created(&self) -> Vec<Address> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlayerCreator for StubPlayerCreator {
    async fn create_player(
        &self,
        game: &GameMetadata,
        _dir: PathBuf,
    ) -> Result<Box<dyn GamePlayer>> {
        if self.failing.lock().unwrap().remove(&game.proxy) {
            return Err(anyhow!("absolute prestate does not match"));
        }
        self.created.lock().unwrap().push(game.proxy);
        Ok(Box::new(StubPlayer {
            address: game.proxy,
            outcomes: Arc::clone(&self.outcomes),
            status: GameStatus::InProgress,
        }))
    }
}

/// A [DiskManager] that records requests without touching the filesystem.
#[derive(Default)]
pub(crate) struct StubDiskManager {
    dirs: Mutex<Vec<Address>>,
    kept: Mutex<Vec<Vec<Address>>>,
}

impl StubDiskManager {
    pub(crate) fn dirs(&self) -> Vec<Address> {
        self.dirs.lock().unwrap().clone()
    }

    pub(crate) fn prunes(&self) -> usize {
        self.kept.lock().unwrap().len()
    }

    pub(crate) fn last_kept(&self) -> Option<Vec<Address>> {
        self.kept.lock().unwrap().last().cloned()
    }
}

impl DiskManager for StubDiskManager {
    fn dir_for_game(&self, game: Address) -> Result<PathBuf> {
        self.dirs.lock().unwrap().push(game);
        Ok(PathBuf::from(format!("/stub/game-{:x}", game)))
    }

    fn remove_all_except(&self, keep: &[Address]) -> Result<()> {
        self.kept.lock().unwrap().push(keep.to_vec());
        Ok(())
    }
}
