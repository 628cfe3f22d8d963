//! The split selector composes a coarse "top" trace with finer-grained "bottom" traces that are
//! only created for the sub-ranges actually disputed.

use super::{ProviderSelector, TraceError, TraceProvider, TranslatingProvider};
use crate::fault::{Claim, ClaimData, GameState, Position};
use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;

/// The [BottomProviderCreator] trait builds the trace between two agreed-upon top game claims.
#[async_trait]
pub trait BottomProviderCreator: Send + Sync {
    /// Creates the provider for the trace between `pre` and `post`. `pre` is `None` when the
    /// bottom trace starts from the absolute prestate. `depth` is the depth of the bottom game.
    async fn create(
        &self,
        pre: Option<&ClaimData>,
        post: &ClaimData,
        depth: u64,
    ) -> Result<Arc<dyn TraceProvider>, TraceError>;
}

/// Identifies a bottom game by the top game claims bounding it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BottomKey {
    pre: Option<(u128, Claim)>,
    post: (u128, Claim),
}

/// A [ProviderSelector] for games whose upper levels bisect over one trace (e.g. output roots)
/// and whose lower levels bisect over a finer trace (e.g. VM instructions) between two of them.
pub struct SplitProviderSelector {
    top: Arc<dyn TraceProvider>,
    split_depth: u64,
    creator: Arc<dyn BottomProviderCreator>,
    /// Never evicted. Holds at most one provider per distinct pair of bounding top-leaf claims
    /// in the game, and is dropped with the player.
    bottoms: Mutex<HashMap<BottomKey, Arc<dyn TraceProvider>>>,
}

impl SplitProviderSelector {
    /// Creates a new [SplitProviderSelector]. The top game covers depths `0..=split_depth`.
    pub fn new(
        top: Arc<dyn TraceProvider>,
        split_depth: u64,
        creator: Arc<dyn BottomProviderCreator>,
    ) -> Self {
        Self {
            top,
            split_depth,
            creator,
            bottoms: Mutex::new(HashMap::new()),
        }
    }

    /// Finds the top game claims bounding the bottom game that `position` belongs to.
    fn bounding_claims<'a>(
        &self,
        game: &'a GameState,
        ref_claim: &'a ClaimData,
        position: u128,
    ) -> Result<(Option<&'a ClaimData>, &'a ClaimData), TraceError> {
        let top_leaf = game.ancestor_at_depth(ref_claim, self.split_depth)?;
        let leaf_trace_index = top_leaf.position.trace_index(self.split_depth);

        // Positions right of the top leaf's sub-tree defend it, so it is the pre-state.
        // Otherwise the top leaf is being attacked and is the post-state.
        if position.index_at_depth() > top_leaf.position.trace_index(position.depth()) {
            let post =
                game.ancestor_with_trace_index(top_leaf, self.split_depth, leaf_trace_index + 1)?;
            Ok((Some(top_leaf), post))
        } else if leaf_trace_index == 0 {
            Ok((None, top_leaf))
        } else {
            let pre =
                game.ancestor_with_trace_index(top_leaf, self.split_depth, leaf_trace_index - 1)?;
            Ok((Some(pre), top_leaf))
        }
    }
}

#[async_trait]
impl ProviderSelector for SplitProviderSelector {
    async fn select(
        &self,
        game: &GameState,
        ref_claim: &ClaimData,
        position: u128,
    ) -> Result<Arc<dyn TraceProvider>, TraceError> {
        if position.depth() <= self.split_depth {
            return Ok(Arc::clone(&self.top));
        }
        if ref_claim.position.depth() < self.split_depth {
            return Err(TraceError::RefClaimNotDeepEnough {
                depth: ref_claim.position.depth(),
                split_depth: self.split_depth,
            });
        }

        let (pre, post) = self.bounding_claims(game, ref_claim, position)?;
        let key = BottomKey {
            pre: pre.map(|c| (c.position, c.claim)),
            post: (post.position, post.claim),
        };

        let mut bottoms = self.bottoms.lock().await;
        if let Some(provider) = bottoms.get(&key) {
            return Ok(Arc::clone(provider));
        }

        // The top game includes the split depth, so the bottom game starts one level below it.
        let bottom_depth = game.max_depth() - self.split_depth - 1;
        tracing::debug!(
            target: "split-selector",
            "Creating bottom trace provider for post claim at position {}",
            post.position
        );
        let provider = self.creator.create(pre, post, bottom_depth).await?;
        let translated: Arc<dyn TraceProvider> =
            Arc::new(TranslatingProvider::new(provider, self.split_depth + 1));
        bottoms.insert(key, Arc::clone(&translated));
        Ok(translated)
    }
}
