//! The `agent` module runs one pass of the solver over a game and publishes its responses.

use crate::{contracts::GameContract, responder::Responder, types::GameStatus};
use anyhow::{anyhow, Context, Result};
use dispute_challenger_solvers::fault::{Action, GameSolver, GameState};
use ethers::types::Address;
use futures::future::join_all;
use std::sync::Arc;

/// The [Agent] plays one side of a single fault dispute game.
pub struct Agent {
    solver: GameSolver,
    loader: Arc<dyn GameContract>,
    responder: Arc<dyn Responder>,
    max_depth: u64,
    agree_with_proposed_output: bool,
    game: Address,
}

impl Agent {
    /// Creates a new [Agent] for the game at `game`.
    pub fn new(
        solver: GameSolver,
        loader: Arc<dyn GameContract>,
        responder: Arc<dyn Responder>,
        max_depth: u64,
        agree_with_proposed_output: bool,
        game: Address,
    ) -> Self {
        Self {
            solver,
            loader,
            responder,
            max_depth,
            agree_with_proposed_output,
            game,
        }
    }

    /// Resolves the game if it can be resolved in our favour. Otherwise loads the current claims
    /// and responds to every claim we disagree with.
    pub async fn act(&self) -> Result<()> {
        if self.try_resolve().await {
            return Ok(());
        }

        let game = self.new_game_from_contracts().await?;
        let next = self.solver.calculate_next_actions(&game).await;
        for err in &next.errors {
            tracing::error!(
                target: "agent",
                "Failed to calculate response for game {:?}: {:#}",
                self.game,
                err
            );
        }

        join_all(next.actions.into_iter().map(|action| self.perform(action))).await;
        Ok(())
    }

    async fn perform(&self, action: Action) {
        let parent_index = action.parent_index();
        let kind = match (&action, action.is_attack()) {
            (Action::Move { .. }, true) => "attack",
            (Action::Move { .. }, false) => "defend",
            (Action::Step { .. }, true) => "step attack",
            (Action::Step { .. }, false) => "step defend",
        };
        tracing::info!(
            target: "agent",
            "Performing {} against claim {} in game {:?}",
            kind,
            parent_index,
            self.game
        );

        match self.responder.perform_action(action).await {
            Ok(()) => {}
            Err(e) if e.is_revert() => {
                tracing::info!(
                    target: "agent",
                    "Action against claim {} reverted, assuming it was already handled: {}",
                    parent_index,
                    e
                );
            }
            Err(e) => {
                tracing::error!(
                    target: "agent",
                    "Action against claim {} failed: {}",
                    parent_index,
                    e
                );
            }
        }
    }

    /// Returns true if the game is resolvable in our favour and resolution was attempted.
    async fn try_resolve(&self) -> bool {
        let status = match self.responder.call_resolve().await {
            Ok(status) => status,
            Err(_) => return false,
        };
        if status == GameStatus::InProgress || !self.should_resolve(status) {
            return false;
        }

        tracing::info!(target: "agent", "Resolving game {:?}", self.game);
        if let Err(e) = self.responder.resolve().await {
            tracing::error!(target: "agent", "Failed to resolve game {:?}: {}", self.game, e);
        }
        true
    }

    fn should_resolve(&self, status: GameStatus) -> bool {
        let expected = self.expected_status();
        if status != expected {
            tracing::warn!(
                target: "agent",
                "Game {:?} will be lost. Expected: {}, actual: {}",
                self.game,
                expected,
                status
            );
        }
        status == expected
    }

    fn expected_status(&self) -> GameStatus {
        if self.agree_with_proposed_output {
            GameStatus::ChallengerWon
        } else {
            GameStatus::DefenderWon
        }
    }

    async fn new_game_from_contracts(&self) -> Result<GameState> {
        let claims = self
            .loader
            .get_all_claims()
            .await
            .context("failed to fetch claims")?;
        if claims.is_empty() {
            return Err(anyhow!("no claims loaded for game {:?}", self.game));
        }
        Ok(GameState::new(
            self.agree_with_proposed_output,
            claims,
            self.max_depth,
        ))
    }
}
