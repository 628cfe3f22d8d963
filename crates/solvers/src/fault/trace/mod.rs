//! Trace providers supply our view of the execution trace at arbitrary positions of the game
//! tree, and the accessor composes them into a single trace covering the whole game.

use super::{Claim, Position, TraceStepData};
use async_trait::async_trait;
use thiserror::Error;

mod access;
pub use access::{ProviderSelector, SimpleSelector, TraceAccessor};

mod alphabet;
pub use alphabet::AlphabetTraceProvider;

mod split;
pub use split::{BottomProviderCreator, SplitProviderSelector};

mod translate;
pub use translate::TranslatingProvider;

/// Errors returned by [TraceProvider]s and [ProviderSelector]s.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The requested position lies below the deepest level of the trace.
    #[error("position at depth {depth} is deeper than the trace depth {max_depth}")]
    PositionTooDeep { depth: u64, max_depth: u64 },
    /// The requested position lies above the root of a translated trace.
    #[error("position at depth {depth} is above the trace root at depth {root_depth}")]
    PositionTooShallow { depth: u64, root_depth: u64 },
    /// The requested trace index is past the end of the trace.
    #[error("trace index {0} is too large")]
    IndexTooLarge(u128),
    /// The operation is not supported by this kind of trace.
    #[error("{0} is not supported by this trace")]
    Unsupported(&'static str),
    /// The trace required for this position has no implementation in this configuration.
    #[error("{0} is not implemented")]
    Unimplemented(String),
    /// A position below the split depth was requested relative to a claim above it.
    #[error("reference claim at depth {depth} is above the split depth {split_depth}")]
    RefClaimNotDeepEnough { depth: u64, split_depth: u64 },
    /// Any other failure, e.g. an RPC error while fetching the trace.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The [TraceProvider] trait defines the interface of a single, contiguous execution trace.
#[async_trait]
pub trait TraceProvider: Send + Sync {
    /// Returns the claim hash committing to the trace at `position`.
    async fn get(&self, position: u128) -> Result<Claim, TraceError>;

    /// Returns the pre-state, proof and oracle data needed to step from the trace index prior
    /// to the one `position` commits to.
    async fn get_step_data(&self, position: u128) -> Result<TraceStepData, TraceError>;

    /// Returns the commitment to the state before the first instruction of the trace.
    async fn absolute_prestate_commitment(&self) -> Result<Claim, TraceError>;
}

/// Fails if `position` lies below `max_depth`.
pub(crate) fn check_depth(position: u128, max_depth: u64) -> Result<(), TraceError> {
    if position.depth() > max_depth {
        return Err(TraceError::PositionTooDeep {
            depth: position.depth(),
            max_depth,
        });
    }
    Ok(())
}
