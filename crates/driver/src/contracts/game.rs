use super::{candidate, to_u64, GameContract};
use crate::{
    bindings::{FaultDisputeGame, PreimageOracle, MIPS},
    txmgr::TxCandidate,
    types::GameStatus,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use dispute_challenger_solvers::fault::{Claim, ClaimData, Clock, PreimageOracleData};
use ethers::{
    providers::Middleware,
    types::{Address, Bytes, H256, U256},
};
use futures::future::try_join_all;
use std::sync::Arc;

/// The ethers-backed [GameContract] for a `FaultDisputeGame` proxy.
pub struct FaultDisputeGameContract<M> {
    address: Address,
    client: Arc<M>,
    game: FaultDisputeGame<M>,
}

impl<M: Middleware + 'static> FaultDisputeGameContract<M> {
    /// Creates a new [FaultDisputeGameContract] for the game at `address`.
    pub fn new(address: Address, client: Arc<M>) -> Self {
        Self {
            address,
            game: FaultDisputeGame::new(address, Arc::clone(&client)),
            client,
        }
    }

    async fn get_claim(&self, index: u64) -> Result<ClaimData> {
        let (parent_index, countered, claim, position, clock) = self
            .game
            .claim_data(U256::from(index))
            .call()
            .await
            .with_context(|| format!("failed to load claim {}", index))?;
        Ok(ClaimData {
            contract_index: index as usize,
            parent_index,
            countered,
            claim: H256::from(claim),
            position,
            clock: Clock::from(clock),
        })
    }
}

#[async_trait]
impl<M: Middleware + 'static> GameContract for FaultDisputeGameContract<M> {
    async fn get_status(&self) -> Result<GameStatus> {
        let status = self
            .game
            .status()
            .call()
            .await
            .context("failed to fetch game status")?;
        GameStatus::try_from(status)
    }

    async fn get_claim_count(&self) -> Result<u64> {
        let count = self
            .game
            .claim_data_len()
            .call()
            .await
            .context("failed to fetch claim count")?;
        to_u64(count, "claim count")
    }

    async fn get_max_game_depth(&self) -> Result<u64> {
        let depth = self
            .game
            .max_game_depth()
            .call()
            .await
            .context("failed to fetch max game depth")?;
        to_u64(depth, "max game depth")
    }

    async fn get_split_depth(&self) -> Result<u64> {
        let depth = self
            .game
            .split_depth()
            .call()
            .await
            .context("failed to fetch split depth")?;
        to_u64(depth, "split depth")
    }

    async fn get_absolute_prestate_hash(&self) -> Result<H256> {
        let prestate = self
            .game
            .absolute_prestate()
            .call()
            .await
            .context("failed to fetch absolute prestate")?;
        Ok(H256::from(prestate))
    }

    async fn get_block_range(&self) -> Result<(u64, u64)> {
        let prestate_block = self
            .game
            .starting_block_number()
            .call()
            .await
            .context("failed to fetch starting block number")?;
        let poststate_block = self
            .game
            .l_2_block_number()
            .call()
            .await
            .context("failed to fetch l2 block number")?;
        Ok((
            to_u64(prestate_block, "starting block number")?,
            to_u64(poststate_block, "l2 block number")?,
        ))
    }

    async fn get_all_claims(&self) -> Result<Vec<ClaimData>> {
        let count = self.get_claim_count().await?;
        try_join_all((0..count).map(|index| self.get_claim(index))).await
    }

    async fn call_resolve(&self) -> Result<GameStatus> {
        let status = self
            .game
            .resolve()
            .call()
            .await
            .context("failed to simulate resolve")?;
        GameStatus::try_from(status)
    }

    fn attack_tx(&self, parent_index: usize, pivot: Claim) -> Result<TxCandidate> {
        candidate(
            self.address,
            self.game.attack(U256::from(parent_index), pivot.to_fixed_bytes()),
        )
    }

    fn defend_tx(&self, parent_index: usize, pivot: Claim) -> Result<TxCandidate> {
        candidate(
            self.address,
            self.game.defend(U256::from(parent_index), pivot.to_fixed_bytes()),
        )
    }

    fn step_tx(
        &self,
        claim_index: usize,
        is_attack: bool,
        state_data: Bytes,
        proof: Bytes,
    ) -> Result<TxCandidate> {
        candidate(
            self.address,
            self.game
                .step(U256::from(claim_index), is_attack, state_data, proof),
        )
    }

    fn resolve_tx(&self) -> Result<TxCandidate> {
        candidate(self.address, self.game.resolve())
    }

    async fn update_oracle_tx(&self, data: &PreimageOracleData) -> Result<TxCandidate> {
        if data.is_local {
            return candidate(
                self.address,
                self.game
                    .add_local_data(data.local_ident(), U256::from(data.oracle_offset)),
            );
        }

        let vm_address = self
            .game
            .vm()
            .call()
            .await
            .context("failed to load VM address")?;
        let oracle_address = MIPS::new(vm_address, Arc::clone(&self.client))
            .oracle()
            .call()
            .await
            .context("failed to load preimage oracle address")?;
        let oracle = PreimageOracle::new(oracle_address, Arc::clone(&self.client));
        candidate(
            oracle_address,
            oracle.load_keccak_256_preimage_part(
                U256::from(data.oracle_offset),
                data.preimage_without_size(),
            ),
        )
    }
}
