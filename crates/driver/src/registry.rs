//! The `registry` module maps each trace type to the resources needed to play its games.

use crate::{
    config::{DriverConfig, TraceType},
    contracts::GameContract,
    outputs::{OutputRootSource, OutputTraceProvider},
    player::{GameValidator, PrestateValidator, ResourceCreator},
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use dispute_challenger_solvers::fault::{
    trace::{
        AlphabetTraceProvider, BottomProviderCreator, SplitProviderSelector, TraceAccessor,
        TraceError, TraceProvider,
    },
    Claim, ClaimData, TraceStepData,
};
use ethers::types::{Address, H256};
use std::{path::Path, sync::Arc};

/// Returns the [ResourceCreator] for the configured trace type.
pub fn resource_creator(
    config: &DriverConfig,
    rollup: Option<Arc<dyn OutputRootSource>>,
) -> Result<Arc<dyn ResourceCreator>> {
    let require_alphabet = || {
        config
            .alphabet_trace
            .clone()
            .ok_or(anyhow!("alphabet trace types require an alphabet"))
    };
    let require_rollup = || {
        rollup
            .clone()
            .ok_or(anyhow!("output trace types require a rollup RPC"))
    };

    Ok(match config.trace_type {
        TraceType::Alphabet => Arc::new(AlphabetResources {
            alphabet: require_alphabet()?,
        }),
        TraceType::OutputAlphabet => {
            let alphabet = require_alphabet()?;
            Arc::new(OutputResources {
                rollup: require_rollup()?,
                bottom: Arc::new(AlphabetBottomCreator {
                    alphabet: alphabet.clone(),
                }),
                bottom_prestate: Arc::new(AlphabetTraceProvider::new(&alphabet, 0)),
            })
        }
        TraceType::OutputCannon => {
            let prestate = config
                .cannon_absolute_prestate
                .ok_or(anyhow!("output cannon trace type requires an absolute prestate"))?;
            Arc::new(OutputResources {
                rollup: require_rollup()?,
                bottom: Arc::new(CannonBottomCreator),
                bottom_prestate: Arc::new(CannonPrestateProvider { prestate }),
            })
        }
    })
}

/// Resources for games bisecting over the alphabet trace only.
struct AlphabetResources {
    alphabet: String,
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
        let provider: Arc<dyn TraceProvider> =
            Arc::new(AlphabetTraceProvider::new(&self.alphabet, game_depth));
        Ok((
            TraceAccessor::simple(Arc::clone(&provider)),
            Box::new(PrestateValidator::new(provider)),
        ))
    }
}

/// Resources for games bisecting over output roots, then over a bottom trace between two of them.
struct OutputResources {
    rollup: Arc<dyn OutputRootSource>,
    bottom: Arc<dyn BottomProviderCreator>,
    /// Every bottom trace starts from this provider's absolute prestate.
    bottom_prestate: Arc<dyn TraceProvider>,
}

#[async_trait]
impl ResourceCreator for OutputResources {
    async fn create(
        &self,
        game: Address,
        contract: Arc<dyn GameContract>,
        _game_depth: u64,
        _dir: &Path,
    ) -> Result<(TraceAccessor, Box<dyn GameValidator>)> {
        let split_depth = contract
            .get_split_depth()
            .await
            .context("failed to load split depth")?;
        let (prestate_block, poststate_block) = contract
            .get_block_range()
            .await
            .context("failed to load block numbers")?;
        tracing::debug!(
            target: "game-player",
            "Game {:?} disputes L2 blocks {} to {} with split depth {}",
            game,
            prestate_block,
            poststate_block,
            split_depth
        );

        let top: Arc<dyn TraceProvider> = Arc::new(OutputTraceProvider::new(
            Arc::clone(&self.rollup),
            split_depth,
            prestate_block,
            poststate_block,
        ));
        let selector = SplitProviderSelector::new(top, split_depth, Arc::clone(&self.bottom));
        Ok((
            TraceAccessor::new(Arc::new(selector)),
            Box::new(PrestateValidator::new(Arc::clone(&self.bottom_prestate))),
        ))
    }
}

/// Creates alphabet traces between output roots.
struct AlphabetBottomCreator {
    alphabet: String,
}

#[async_trait]
impl BottomProviderCreator for AlphabetBottomCreator {
    async fn create(
        &self,
        _pre: Option<&ClaimData>,
        _post: &ClaimData,
        depth: u64,
    ) -> Result<Arc<dyn TraceProvider>, TraceError> {
        Ok(Arc::new(AlphabetTraceProvider::new(&self.alphabet, depth)))
    }
}

/// The VM instruction trace between output roots. Generating it requires running the VM, which
/// the challenger does not do yet.
struct CannonBottomCreator;

#[async_trait]
impl BottomProviderCreator for CannonBottomCreator {
    async fn create(
        &self,
        _pre: Option<&ClaimData>,
        _post: &ClaimData,
        _depth: u64,
    ) -> Result<Arc<dyn TraceProvider>, TraceError> {
        Err(TraceError::Unimplemented("cannon trace provider".to_string()))
    }
}

/// Answers the configured absolute prestate of the cannon trace and nothing else.
struct CannonPrestateProvider {
    prestate: H256,
}

#[async_trait]
impl TraceProvider for CannonPrestateProvider {
    async fn get(&self, _position: u128) -> Result<Claim, TraceError> {
        Err(TraceError::Unimplemented("cannon trace provider".to_string()))
    }

    async fn get_step_data(&self, _position: u128) -> Result<TraceStepData, TraceError> {
        Err(TraceError::Unimplemented("cannon trace provider".to_string()))
    }

    async fn absolute_prestate_commitment(&self) -> Result<Claim, TraceError> {
        Ok(self.prestate)
    }
}
