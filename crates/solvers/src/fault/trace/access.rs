//! The [TraceAccessor] resolves which [TraceProvider] serves a position of the game tree.

use super::{TraceError, TraceProvider};
use crate::fault::{Claim, ClaimData, GameState, TraceStepData};
use async_trait::async_trait;
use std::sync::Arc;

/// The [ProviderSelector] trait picks the [TraceProvider] responsible for `position`, given the
/// claim being responded to.
#[async_trait]
pub trait ProviderSelector: Send + Sync {
    /// Returns the provider for `position`. `ref_claim` is the claim being responded to and is
    /// used to locate the sub-range a finer-grained provider must cover.
    async fn select(
        &self,
        game: &GameState,
        ref_claim: &ClaimData,
        position: u128,
    ) -> Result<Arc<dyn TraceProvider>, TraceError>;
}

/// A [ProviderSelector] that uses one provider for the whole game.
pub struct SimpleSelector(pub Arc<dyn TraceProvider>);

#[async_trait]
impl ProviderSelector for SimpleSelector {
    async fn select(
        &self,
        _game: &GameState,
        _ref_claim: &ClaimData,
        _position: u128,
    ) -> Result<Arc<dyn TraceProvider>, TraceError> {
        Ok(Arc::clone(&self.0))
    }
}

/// The [TraceAccessor] presents the trace of a whole game, whatever providers it is composed of.
#[derive(Clone)]
pub struct TraceAccessor {
    selector: Arc<dyn ProviderSelector>,
}

impl TraceAccessor {
    /// Creates a new [TraceAccessor] over the given selector.
    pub fn new(selector: Arc<dyn ProviderSelector>) -> Self {
        Self { selector }
    }

    /// Creates a new [TraceAccessor] backed by a single provider.
    pub fn simple(provider: Arc<dyn TraceProvider>) -> Self {
        Self::new(Arc::new(SimpleSelector(provider)))
    }

    /// Returns our claim at `position`.
    pub async fn get(
        &self,
        game: &GameState,
        ref_claim: &ClaimData,
        position: u128,
    ) -> Result<Claim, TraceError> {
        let provider = self.selector.select(game, ref_claim, position).await?;
        provider.get(position).await
    }

    /// Returns the data required to step from the trace index preceding `position`.
    pub async fn get_step_data(
        &self,
        game: &GameState,
        ref_claim: &ClaimData,
        position: u128,
    ) -> Result<TraceStepData, TraceError> {
        let provider = self.selector.select(game, ref_claim, position).await?;
        provider.get_step_data(position).await
    }
}
