//! The `txmgr` module sends transactions built by the responder and waits for their receipts.

use async_trait::async_trait;
use ethers::{
    providers::{Middleware, MiddlewareError},
    types::{Address, Bytes, TransactionReceipt, TransactionRequest, H256, U256, U64},
};
use std::sync::Arc;
use thiserror::Error;

/// A transaction that has been built but not yet signed or sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxCandidate {
    /// The recipient of the transaction.
    pub to: Address,
    /// The calldata of the transaction.
    pub tx_data: Bytes,
    /// The gas limit, estimated by the node when `None`.
    pub gas_limit: Option<U256>,
}

/// Errors returned by a [TxManager].
#[derive(Debug, Error)]
pub enum TxError {
    /// The transaction could not be signed or submitted.
    #[error("failed to send transaction: {0}")]
    Send(#[source] anyhow::Error),
    /// The node rejected the transaction because it would revert.
    #[error("transaction would revert: {0}")]
    Rejected(#[source] anyhow::Error),
    /// The transaction never made it into a block.
    #[error("transaction {0:?} was dropped")]
    Dropped(H256),
    /// The transaction was mined but reverted.
    #[error("transaction {tx_hash:?} reverted")]
    Reverted {
        /// The hash of the reverted transaction.
        tx_hash: H256,
    },
}

impl TxError {
    /// Returns true if the transaction reverted, either on-chain or when the node estimated it.
    pub fn is_revert(&self) -> bool {
        matches!(self, TxError::Reverted { .. } | TxError::Rejected(_))
    }
}

/// The [TxManager] trait sends a [TxCandidate] and waits until it is included.
#[async_trait]
pub trait TxManager: Send + Sync {
    /// Sends `candidate` and returns its receipt once it has been included.
    async fn send(&self, candidate: TxCandidate) -> Result<TransactionReceipt, TxError>;
}

/// A [TxManager] that signs through the client's middleware stack and waits for a fixed number
/// of confirmations.
pub struct SimpleTxManager<M> {
    client: Arc<M>,
    num_confirmations: usize,
}

impl<M: Middleware + 'static> SimpleTxManager<M> {
    /// Creates a new [SimpleTxManager].
    pub fn new(client: Arc<M>, num_confirmations: usize) -> Self {
        Self {
            client,
            num_confirmations,
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> TxManager for SimpleTxManager<M> {
    async fn send(&self, candidate: TxCandidate) -> Result<TransactionReceipt, TxError> {
        let mut tx = TransactionRequest::new()
            .to(candidate.to)
            .data(candidate.tx_data);
        if let Some(gas) = candidate.gas_limit {
            tx = tx.gas(gas);
        }

        let pending = self
            .client
            .send_transaction(tx, None)
            .await
            .map_err(|e| {
                // Gas estimation fails with a revert if the move is already stale.
                if e.as_error_response().map_or(false, |r| r.is_revert()) {
                    TxError::Rejected(anyhow::anyhow!("{}", e))
                } else {
                    TxError::Send(anyhow::anyhow!("{}", e))
                }
            })?;
        let tx_hash = pending.tx_hash();
        tracing::debug!(target: "tx-manager", "Transaction sent. Tx hash: {:?}", tx_hash);

        let receipt = pending
            .confirmations(self.num_confirmations)
            .await
            .map_err(|e| TxError::Send(e.into()))?
            .ok_or(TxError::Dropped(tx_hash))?;

        if receipt.status == Some(U64::zero()) {
            tracing::warn!(target: "tx-manager", "Transaction reverted. Tx hash: {:?}", tx_hash);
            return Err(TxError::Reverted { tx_hash });
        }
        tracing::info!(
            target: "tx-manager",
            "Transaction confirmed in block {:?}. Tx hash: {:?}",
            receipt.block_number,
            tx_hash
        );
        Ok(receipt)
    }
}
