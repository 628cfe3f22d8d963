//! Typed wrappers around the dispute game contracts.

use crate::{txmgr::TxCandidate, types::GameStatus};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use dispute_challenger_solvers::fault::{Claim, ClaimData, PreimageOracleData};
use ethers::{
    contract::ContractCall,
    providers::Middleware,
    types::{Address, BlockId, BlockNumber, Bytes, H256, U256},
};

mod factory;
pub use factory::{DisputeGameFactoryContract, GameSource};

mod game;
pub use game::FaultDisputeGameContract;

/// The [GameContract] trait is the read and transaction-building interface of a single fault
/// dispute game.
#[async_trait]
pub trait GameContract: Send + Sync {
    /// Returns the current status of the game.
    async fn get_status(&self) -> Result<GameStatus>;
    /// Returns the number of claims made in the game.
    async fn get_claim_count(&self) -> Result<u64>;
    /// Returns the maximum depth of the game tree.
    async fn get_max_game_depth(&self) -> Result<u64>;
    /// Returns the depth at which the top game ends and the bottom game begins.
    async fn get_split_depth(&self) -> Result<u64>;
    /// Returns the absolute prestate the game's VM starts from.
    async fn get_absolute_prestate_hash(&self) -> Result<H256>;
    /// Returns the L2 block numbers of the agreed starting output and the disputed output.
    async fn get_block_range(&self) -> Result<(u64, u64)>;
    /// Returns every claim made in the game, in contract order.
    async fn get_all_claims(&self) -> Result<Vec<ClaimData>>;
    /// Simulates resolving the game and returns the status it would resolve to.
    async fn call_resolve(&self) -> Result<GameStatus>;
    /// Builds a transaction attacking the claim at `parent_index`.
    fn attack_tx(&self, parent_index: usize, pivot: Claim) -> Result<TxCandidate>;
    /// Builds a transaction defending the claim at `parent_index`.
    fn defend_tx(&self, parent_index: usize, pivot: Claim) -> Result<TxCandidate>;
    /// Builds a transaction stepping against the leaf claim at `claim_index`.
    fn step_tx(
        &self,
        claim_index: usize,
        is_attack: bool,
        state_data: Bytes,
        proof: Bytes,
    ) -> Result<TxCandidate>;
    /// Builds a transaction resolving the game.
    fn resolve_tx(&self) -> Result<TxCandidate>;
    /// Builds a transaction loading `data` into the preimage oracle.
    async fn update_oracle_tx(&self, data: &PreimageOracleData) -> Result<TxCandidate>;
}

/// Returns the [BlockId] for a block number.
pub(crate) fn at_block(block: u64) -> BlockId {
    BlockId::Number(BlockNumber::Number(block.into()))
}

/// Narrows a `uint256` return value.
pub(crate) fn to_u64(value: U256, what: &str) -> Result<u64> {
    if value > U256::from(u64::MAX) {
        return Err(anyhow!("{} does not fit in a u64: {}", what, value));
    }
    Ok(value.as_u64())
}

/// Turns a prepared contract call into a [TxCandidate] for the transaction manager.
pub(crate) fn candidate<M: Middleware, D: ethers::abi::Detokenize>(
    to: Address,
    call: ContractCall<M, D>,
) -> Result<TxCandidate> {
    let tx_data = call
        .calldata()
        .ok_or(anyhow!("Contract call is missing calldata"))?;
    Ok(TxCandidate {
        to,
        tx_data,
        gas_limit: None,
    })
}
