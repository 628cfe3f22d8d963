//! Re-roots a trace provider so that it can serve a sub-tree of a larger game.

use super::{TraceError, TraceProvider};
use crate::fault::{Claim, Position, TraceStepData};
use async_trait::async_trait;
use std::sync::Arc;

/// A [TraceProvider] that serves the sub-tree rooted at `root_depth` using an inner provider
/// whose own root is that sub-tree's root.
pub struct TranslatingProvider {
    root_depth: u64,
    provider: Arc<dyn TraceProvider>,
}

impl TranslatingProvider {
    /// Wraps `provider` so that depth `root_depth` of the game maps to depth 0 of `provider`.
    pub fn new(provider: Arc<dyn TraceProvider>, root_depth: u64) -> Self {
        Self {
            root_depth,
            provider,
        }
    }

    fn translate(&self, position: u128) -> Result<u128, TraceError> {
        position
            .relative_to_ancestor_at_depth(self.root_depth)
            .ok_or(TraceError::PositionTooShallow {
                depth: position.depth(),
                root_depth: self.root_depth,
            })
    }
}

#[async_trait]
impl TraceProvider for TranslatingProvider {
    async fn get(&self, position: u128) -> Result<Claim, TraceError> {
        self.provider.get(self.translate(position)?).await
    }

    async fn get_step_data(&self, position: u128) -> Result<TraceStepData, TraceError> {
        self.provider.get_step_data(self.translate(position)?).await
    }

    async fn absolute_prestate_commitment(&self) -> Result<Claim, TraceError> {
        self.provider.absolute_prestate_commitment().await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fault::{compute_gindex, trace::AlphabetTraceProvider};

    #[tokio::test]
    async fn translates_into_subtree() {
        let inner = Arc::new(AlphabetTraceProvider::new("abcd", 2));
        let provider = TranslatingProvider::new(inner.clone(), 3);

        // Depth 5, index 0b10110 is depth 2, index 0b10 relative to its depth 3 ancestor.
        let translated = provider.get(compute_gindex(5, 0b10110)).await.unwrap();
        assert_eq!(translated, inner.get(compute_gindex(2, 0b10)).await.unwrap());

        let step = provider.get_step_data(compute_gindex(5, 0b10001)).await.unwrap();
        assert_eq!(step, inner.get_step_data(compute_gindex(2, 0b01)).await.unwrap());
    }

    #[tokio::test]
    async fn rejects_positions_above_root() {
        let inner = Arc::new(AlphabetTraceProvider::new("abcd", 2));
        let provider = TranslatingProvider::new(inner, 3);
        assert!(matches!(
            provider.get(compute_gindex(2, 1)).await,
            Err(TraceError::PositionTooShallow {
                depth: 2,
                root_depth: 3
            })
        ));
    }
}
