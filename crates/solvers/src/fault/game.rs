//! The game module holds [GameState], the local view of an on-chain fault dispute game's DAG.

use super::{Claim, ClaimData, Position};
use anyhow::{anyhow, Result};

/// A snapshot of the claims of a fault dispute game, along with the side this participant
/// plays on.
#[derive(Debug, Clone)]
pub struct GameState {
    /// Whether or not we agree with the proposed output root.
    agree_with_proposed_output: bool,
    /// The claims of the game, indexed by their contract index.
    claims: Vec<ClaimData>,
    /// The maximum depth of the game tree.
    max_depth: u64,
}

impl GameState {
    /// Creates a new [GameState] from the full list of on-chain claims.
    pub fn new(agree_with_proposed_output: bool, claims: Vec<ClaimData>, max_depth: u64) -> Self {
        Self {
            agree_with_proposed_output,
            claims,
            max_depth,
        }
    }

    /// Returns every claim in the game, in contract order.
    pub fn claims(&self) -> &[ClaimData] {
        &self.claims
    }

    /// Returns the maximum depth of the game tree.
    pub fn max_depth(&self) -> u64 {
        self.max_depth
    }

    /// Returns whether or not we agree with the proposed output root.
    pub fn agree_with_proposed_output(&self) -> bool {
        self.agree_with_proposed_output
    }

    /// Fetch the [ClaimData] at the given index in the DAG array.
    ///
    /// ### Takes
    /// - `index`: The index of the claim in the DAG array.
    ///
    /// ### Returns
    /// - `Ok(&ClaimData)`: The [ClaimData] at the given index.
    /// - `Err(anyhow::Error)`: The index does not exist in the DAG.
    pub fn claim_data(&self, index: usize) -> Result<&ClaimData> {
        self.claims
            .get(index)
            .ok_or(anyhow!("Invalid claim index {}", index))
    }

    /// Fetch the parent of the given claim.
    pub fn parent(&self, claim: &ClaimData) -> Result<&ClaimData> {
        if claim.is_root() {
            return Err(anyhow!("Root claim has no parent"));
        }
        self.claim_data(claim.parent_index as usize)
    }

    /// Returns true if we agree with claims at the same level as `claim`.
    ///
    /// If we agree with the proposed output, we agree with odd levels. Otherwise we agree with
    /// the root claim level and all even levels.
    pub fn agree_with_claim_level(&self, claim: &ClaimData) -> bool {
        let is_odd_level = claim.position.depth() % 2 == 1;
        if self.agree_with_proposed_output {
            is_odd_level
        } else {
            !is_odd_level
        }
    }

    /// Returns true if a claim with the same parent, position and value already exists.
    pub fn is_duplicate(&self, parent_index: usize, position: u128, value: Claim) -> bool {
        self.claims.iter().any(|c| {
            c.parent_index as usize == parent_index && c.position == position && c.claim == value
        })
    }

    /// Returns true if a move at `position` against the claim at `parent_index` is a defense.
    pub fn defends_parent(&self, parent_index: usize, position: u128) -> Result<bool> {
        let parent = self.claim_data(parent_index)?;
        Ok(position.right_of(parent.position))
    }

    /// Walks up the DAG from `claim` until reaching the ancestor at `depth`.
    pub fn ancestor_at_depth<'a>(
        &'a self,
        claim: &'a ClaimData,
        depth: u64,
    ) -> Result<&'a ClaimData> {
        let mut current = claim;
        while current.position.depth() > depth {
            current = self.parent(current)?;
        }
        if current.position.depth() != depth {
            return Err(anyhow!(
                "Claim at depth {} has no ancestor at depth {}",
                claim.position.depth(),
                depth
            ));
        }
        Ok(current)
    }

    /// Walks up the DAG from `claim` (inclusive) and returns the first claim that commits to
    /// `trace_index` when the tree is truncated at `depth`.
    pub fn ancestor_with_trace_index<'a>(
        &'a self,
        claim: &'a ClaimData,
        depth: u64,
        trace_index: u128,
    ) -> Result<&'a ClaimData> {
        let mut current = claim;
        loop {
            if current.position.depth() <= depth
                && current.position.trace_index(depth) == trace_index
            {
                return Ok(current);
            }
            if current.is_root() {
                return Err(anyhow!(
                    "No ancestor of claim {} commits to trace index {}",
                    claim.contract_index,
                    trace_index
                ));
            }
            current = self.parent(current)?;
        }
    }
}
