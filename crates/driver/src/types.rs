use ethers::{
    prelude::{k256::ecdsa::SigningKey, SignerMiddleware},
    providers::{Provider, Ws},
    signers::Wallet,
    types::Address,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The L1 client: a websocket provider that signs transactions with the challenger's key.
pub type SignerMiddlewareWS = SignerMiddleware<Provider<Ws>, Wallet<SigningKey>>;

/// The [GameType] enum defines the different types of dispute games with cloneable
/// implementations in the `DisputeGameFactory` contract that the challenger can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum GameType {
    /// Output root bisection on top, VM instruction bisection below.
    OutputCannon = 1,
    /// Output root bisection on top, alphabet bisection below.
    OutputAlphabet = 254,
    /// Alphabet bisection only.
    Alphabet = 255,
}

impl TryFrom<u8> for GameType {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(GameType::OutputCannon),
            254 => Ok(GameType::OutputAlphabet),
            255 => Ok(GameType::Alphabet),
            _ => Err(anyhow::anyhow!("Invalid game type {}", value)),
        }
    }
}

/// The on-chain status of a dispute game. Once a game leaves [GameStatus::InProgress] it never
/// returns to it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum GameStatus {
    /// The game is still being played.
    #[default]
    InProgress = 0,
    /// The root claim was countered.
    ChallengerWon = 1,
    /// The root claim stood.
    DefenderWon = 2,
}

impl GameStatus {
    /// Returns true once the game has resolved.
    pub fn is_terminal(&self) -> bool {
        *self != GameStatus::InProgress
    }
}

impl TryFrom<u8> for GameStatus {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GameStatus::InProgress),
            1 => Ok(GameStatus::ChallengerWon),
            2 => Ok(GameStatus::DefenderWon),
            _ => Err(anyhow::anyhow!("Invalid game status {}", value)),
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::InProgress => write!(f, "In Progress"),
            GameStatus::ChallengerWon => write!(f, "Challenger Won"),
            GameStatus::DefenderWon => write!(f, "Defender Won"),
        }
    }
}

/// A game as recorded by the `DisputeGameFactory`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMetadata {
    /// The raw game type.
    pub game_type: u8,
    /// The UNIX timestamp of the game's creation.
    pub timestamp: u64,
    /// The address of the game proxy.
    pub proxy: Address,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_from_u8() {
        assert_eq!(GameStatus::try_from(0).unwrap(), GameStatus::InProgress);
        assert_eq!(GameStatus::try_from(1).unwrap(), GameStatus::ChallengerWon);
        assert_eq!(GameStatus::try_from(2).unwrap(), GameStatus::DefenderWon);
        assert!(GameStatus::try_from(3).is_err());
    }

    #[test]
    fn only_resolved_statuses_are_terminal() {
        assert!(!GameStatus::InProgress.is_terminal());
        assert!(GameStatus::ChallengerWon.is_terminal());
        assert!(GameStatus::DefenderWon.is_terminal());
    }

    #[test]
    fn game_type_from_u8() {
        assert_eq!(GameType::try_from(255).unwrap(), GameType::Alphabet);
        assert_eq!(GameType::try_from(254).unwrap(), GameType::OutputAlphabet);
        assert_eq!(GameType::try_from(1).unwrap(), GameType::OutputCannon);
        assert!(GameType::try_from(0).is_err());
    }
}
