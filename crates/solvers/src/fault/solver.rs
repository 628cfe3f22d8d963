//! The solver module decides which moves and steps are required to respond to the claims of a
//! fault dispute game, based purely on our own trace.

use super::{trace::TraceAccessor, Action, Claim, ClaimData, GameState, Position, TraceStepData};
use anyhow::{anyhow, Result};

/// A counter claim proposed by the [ClaimSolver].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProposedMove {
    /// The contract index of the claim being countered.
    pub parent_index: usize,
    /// The position of the counter claim.
    pub position: u128,
    /// Our value at `position`.
    pub value: Claim,
}

/// The data required to step against a leaf claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepData {
    /// The contract index of the leaf claim.
    pub leaf_index: usize,
    /// True if we disagree with the leaf claim.
    pub is_attack: bool,
    /// The pre-state, proof and oracle data of the step.
    pub step: TraceStepData,
}

/// Responds to individual claims.
pub struct ClaimSolver {
    trace: TraceAccessor,
    game_depth: u64,
}

impl ClaimSolver {
    /// Creates a new [ClaimSolver] for a game of depth `game_depth`.
    pub fn new(trace: TraceAccessor, game_depth: u64) -> Self {
        Self { trace, game_depth }
    }

    /// Returns the counter claim to `claim`: an attack if we disagree with it, a defense if we
    /// agree with it. Returns `None` if the claim is the root and we agree with it.
    pub async fn next_move(
        &self,
        game: &GameState,
        claim: &ClaimData,
    ) -> Result<Option<ProposedMove>> {
        if claim.position.depth() >= self.game_depth {
            return Err(anyhow!(
                "Game depth reached, claim {} requires a step",
                claim.contract_index
            ));
        }

        let position = if self.agree_with_claim(game, claim).await? {
            if claim.is_root() {
                return Ok(None);
            }
            claim.position.defend()
        } else {
            claim.position.attack()
        };

        let value = self.trace.get(game, claim, position).await?;
        Ok(Some(ProposedMove {
            parent_index: claim.contract_index,
            position,
            value,
        }))
    }

    /// Builds the step against a leaf claim at the maximum depth of the game.
    ///
    /// If we disagree with the leaf, we attack it by executing the step it commits to, using the
    /// state before it. If we agree with it, we defend by executing the step after it, using the
    /// leaf itself as the pre-state.
    pub async fn attempt_step(&self, game: &GameState, claim: &ClaimData) -> Result<StepData> {
        if claim.position.depth() != self.game_depth {
            return Err(anyhow!(
                "Cannot step on non-leaf claim {} at depth {}",
                claim.contract_index,
                claim.position.depth()
            ));
        }

        let claim_correct = self.agree_with_claim(game, claim).await?;
        let position = if claim_correct {
            claim
                .position
                .move_right()
                .ok_or(anyhow!("Cannot defend the final trace index"))?
        } else {
            claim.position
        };

        let step = self.trace.get_step_data(game, claim, position).await?;
        Ok(StepData {
            leaf_index: claim.contract_index,
            is_attack: !claim_correct,
            step,
        })
    }

    async fn agree_with_claim(&self, game: &GameState, claim: &ClaimData) -> Result<bool> {
        let ours = self.trace.get(game, claim, claim.position).await?;
        Ok(ours == claim.claim)
    }
}

/// The actions computed for one pass over a game, along with the claims that could not be
/// evaluated.
#[derive(Debug, Default)]
pub struct NextActions {
    /// Actions to perform.
    pub actions: Vec<Action>,
    /// One error per claim that could not be responded to.
    pub errors: Vec<anyhow::Error>,
}

/// Computes every action required to respond to the current state of a game.
pub struct GameSolver {
    claim_solver: ClaimSolver,
}

impl GameSolver {
    /// Creates a new [GameSolver] for a game of depth `game_depth`.
    pub fn new(game_depth: u64, trace: TraceAccessor) -> Self {
        Self {
            claim_solver: ClaimSolver::new(trace, game_depth),
        }
    }

    /// Returns the actions required to respond to every claim of `game`. Calling this again on
    /// the same game after the actions have landed yields no new actions.
    pub async fn calculate_next_actions(&self, game: &GameState) -> NextActions {
        let mut next = NextActions::default();
        for claim in game.claims() {
            let action = if claim.position.depth() == game.max_depth() {
                self.calculate_step(game, claim).await
            } else {
                self.calculate_move(game, claim).await
            };
            match action {
                Ok(Some(action)) => next.actions.push(action),
                Ok(None) => {}
                Err(e) => next.errors.push(e),
            }
        }
        next
    }

    async fn calculate_step(&self, game: &GameState, claim: &ClaimData) -> Result<Option<Action>> {
        if claim.countered || game.agree_with_claim_level(claim) {
            return Ok(None);
        }
        let step = self.claim_solver.attempt_step(game, claim).await?;
        Ok(Some(Action::Step {
            parent_index: step.leaf_index,
            is_attack: step.is_attack,
            pre_state: step.step.pre_state,
            proof: step.step.proof,
            oracle_data: step.step.oracle_data,
        }))
    }

    async fn calculate_move(&self, game: &GameState, claim: &ClaimData) -> Result<Option<Action>> {
        if game.agree_with_claim_level(claim) {
            return Ok(None);
        }
        let Some(proposed) = self.claim_solver.next_move(game, claim).await? else {
            return Ok(None);
        };
        if game.is_duplicate(proposed.parent_index, proposed.position, proposed.value) {
            return Ok(None);
        }
        Ok(Some(Action::Move {
            parent_index: proposed.parent_index,
            is_attack: !game.defends_parent(proposed.parent_index, proposed.position)?,
            value: proposed.value,
        }))
    }
}
