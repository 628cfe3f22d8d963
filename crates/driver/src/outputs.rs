//! The `outputs` module provides the output root trace used by the top half of output games.

use anyhow::{Context, Result};
use async_trait::async_trait;
use dispute_challenger_solvers::fault::{
    trace::{TraceError, TraceProvider},
    Claim, Position, TraceStepData,
};
use ethers::{
    providers::{Http, JsonRpcClient, Provider},
    types::H256,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The response of the rollup node's `optimism_outputAtBlock` RPC, trimmed to the fields the
/// challenger uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputAtBlockResponse {
    /// The output root version.
    pub version: H256,
    /// The output root at the requested block.
    pub output_root: H256,
}

/// The [OutputRootSource] trait supplies trusted L2 output roots.
#[async_trait]
pub trait OutputRootSource: Send + Sync {
    /// Returns the output root at L2 block `block`.
    async fn output_at_block(&self, block: u64) -> Result<H256>;
}

/// An [OutputRootSource] backed by a trusted rollup node.
pub struct RollupClient<P = Http> {
    provider: Provider<P>,
}

impl RollupClient<Http> {
    /// Creates a new [RollupClient] for the rollup node at `url`.
    pub fn try_new(url: &str) -> Result<Self> {
        let provider = Provider::<Http>::try_from(url)
            .with_context(|| format!("invalid rollup RPC url {}", url))?;
        Ok(Self { provider })
    }
}

impl<P: JsonRpcClient> RollupClient<P> {
    /// Creates a new [RollupClient] from an existing provider.
    pub fn from_provider(provider: Provider<P>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P: JsonRpcClient + 'static> OutputRootSource for RollupClient<P> {
    async fn output_at_block(&self, block: u64) -> Result<H256> {
        let response: OutputAtBlockResponse = self
            .provider
            .request("optimism_outputAtBlock", vec![format!("0x{:x}", block)])
            .await
            .with_context(|| format!("failed to fetch output at block {}", block))?;
        Ok(response.output_root)
    }
}

/// A [TraceProvider] whose trace is the sequence of L2 output roots after the game's starting
/// block. Trace indices past the disputed block all commit to the disputed block's output.
pub struct OutputTraceProvider {
    rollup: Arc<dyn OutputRootSource>,
    depth: u64,
    prestate_block: u64,
    poststate_block: u64,
}

impl OutputTraceProvider {
    /// Creates a new [OutputTraceProvider] for the outputs after `prestate_block` up to
    /// `poststate_block`, bisected to `depth`.
    pub fn new(
        rollup: Arc<dyn OutputRootSource>,
        depth: u64,
        prestate_block: u64,
        poststate_block: u64,
    ) -> Self {
        Self {
            rollup,
            depth,
            prestate_block,
            poststate_block,
        }
    }

    /// Returns the L2 block whose output `position` commits to.
    pub fn block_number(&self, position: u128) -> Result<u64, TraceError> {
        if position.depth() > self.depth {
            return Err(TraceError::PositionTooDeep {
                depth: position.depth(),
                max_depth: self.depth,
            });
        }
        let trace_index = position.trace_index(self.depth);
        let block = u128::from(self.prestate_block)
            .saturating_add(trace_index)
            .saturating_add(1)
            .min(u128::from(self.poststate_block));
        Ok(block as u64)
    }
}

#[async_trait]
impl TraceProvider for OutputTraceProvider {
    async fn get(&self, position: u128) -> Result<Claim, TraceError> {
        let block = self.block_number(position)?;
        Ok(self.rollup.output_at_block(block).await?)
    }

    async fn get_step_data(&self, _position: u128) -> Result<TraceStepData, TraceError> {
        Err(TraceError::Unsupported("stepping on output roots"))
    }

    async fn absolute_prestate_commitment(&self) -> Result<Claim, TraceError> {
        Ok(self.rollup.output_at_block(self.prestate_block).await?)
    }
}
