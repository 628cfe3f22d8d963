//! Data structures, types, and the game solver implementation for the fault dispute game.

mod position;
pub use position::{compute_gindex, Position};

mod types;
pub use types::*;

mod game;
pub use game::GameState;

mod solver;
pub use solver::{ClaimSolver, GameSolver, NextActions, ProposedMove, StepData};

pub mod trace;
