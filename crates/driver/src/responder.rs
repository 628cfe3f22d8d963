//! The `responder` module turns solver [Action]s into transactions.

use crate::{
    contracts::GameContract,
    txmgr::{TxCandidate, TxError, TxManager},
    types::GameStatus,
};
use anyhow::Result;
use async_trait::async_trait;
use dispute_challenger_solvers::fault::Action;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned while performing an [Action] or resolving a game.
#[derive(Debug, Error)]
pub enum ResponderError {
    /// The transaction could not be built.
    #[error("failed to build transaction: {0:#}")]
    Build(#[source] anyhow::Error),
    /// The transaction failed to send or was reverted.
    #[error(transparent)]
    Tx(#[from] TxError),
}

impl ResponderError {
    /// Returns true if the transaction reverted. A revert usually means another participant got
    /// there first, so it is not treated as a failure of the agent.
    pub fn is_revert(&self) -> bool {
        matches!(self, ResponderError::Tx(e) if e.is_revert())
    }
}

/// The [Responder] trait publishes the agent's decisions on-chain.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Simulates resolving the game and returns the resulting status.
    async fn call_resolve(&self) -> Result<GameStatus>;
    /// Resolves the game.
    async fn resolve(&self) -> Result<(), ResponderError>;
    /// Publishes a move or step.
    async fn perform_action(&self, action: Action) -> Result<(), ResponderError>;
}

/// The [FaultResponder] publishes actions against a single fault dispute game.
pub struct FaultResponder {
    tx_mgr: Arc<dyn TxManager>,
    contract: Arc<dyn GameContract>,
}

impl FaultResponder {
    /// Creates a new [FaultResponder].
    pub fn new(tx_mgr: Arc<dyn TxManager>, contract: Arc<dyn GameContract>) -> Self {
        Self { tx_mgr, contract }
    }

    async fn send_and_wait(&self, candidate: TxCandidate) -> Result<(), ResponderError> {
        let receipt = self.tx_mgr.send(candidate).await?;
        tracing::debug!(
            target: "responder",
            "Responder tx successfully published. Tx hash: {:?}",
            receipt.transaction_hash
        );
        Ok(())
    }
}

#[async_trait]
impl Responder for FaultResponder {
    async fn call_resolve(&self) -> Result<GameStatus> {
        self.contract.call_resolve().await
    }

    async fn resolve(&self) -> Result<(), ResponderError> {
        let candidate = self.contract.resolve_tx().map_err(ResponderError::Build)?;
        self.send_and_wait(candidate).await
    }

    async fn perform_action(&self, action: Action) -> Result<(), ResponderError> {
        let candidate = match action {
            Action::Move {
                parent_index,
                is_attack,
                value,
            } => {
                if is_attack {
                    self.contract.attack_tx(parent_index, value)
                } else {
                    self.contract.defend_tx(parent_index, value)
                }
            }
            Action::Step {
                parent_index,
                is_attack,
                pre_state,
                proof,
                oracle_data,
            } => {
                // The oracle must hold the step's preimage before the step can succeed.
                if let Some(data) = oracle_data {
                    tracing::info!(
                        target: "responder",
                        "Updating oracle data. Local: {}, offset: {}",
                        data.is_local,
                        data.oracle_offset
                    );
                    let update = self
                        .contract
                        .update_oracle_tx(&data)
                        .await
                        .map_err(ResponderError::Build)?;
                    self.send_and_wait(update).await?;
                }
                self.contract
                    .step_tx(parent_index, is_attack, pre_state, proof)
            }
        }
        .map_err(ResponderError::Build)?;

        self.send_and_wait(candidate).await
    }
}
