use super::{at_block, to_u64};
use crate::{bindings::DisputeGameFactory, types::GameMetadata};
use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::{
    providers::Middleware,
    types::{Address, U256},
};
use std::sync::Arc;

/// The [GameSource] trait lists the games known to the challenger.
#[async_trait]
pub trait GameSource: Send + Sync {
    /// Returns every game created at or after `earliest_timestamp`, as of `block`.
    async fn fetch_all_games_at_block(
        &self,
        earliest_timestamp: u64,
        block: u64,
    ) -> Result<Vec<GameMetadata>>;
}

/// Read-only wrapper around the `DisputeGameFactory` contract.
pub struct DisputeGameFactoryContract<M> {
    factory: DisputeGameFactory<M>,
}

impl<M: Middleware + 'static> DisputeGameFactoryContract<M> {
    /// Creates a new [DisputeGameFactoryContract] at `address`.
    pub fn new(address: Address, client: Arc<M>) -> Self {
        Self {
            factory: DisputeGameFactory::new(address, client),
        }
    }

    /// Returns the number of games created by the factory as of `block`.
    pub async fn get_game_count(&self, block: u64) -> Result<u64> {
        let count = self
            .factory
            .game_count()
            .block(at_block(block))
            .call()
            .await
            .context("failed to load game count")?;
        to_u64(count, "game count")
    }

    /// Returns the game at `index` as of `block`.
    pub async fn get_game(&self, index: u64, block: u64) -> Result<GameMetadata> {
        let (game_type, timestamp, proxy) = self
            .factory
            .game_at_index(U256::from(index))
            .block(at_block(block))
            .call()
            .await
            .with_context(|| format!("failed to load game {}", index))?;
        Ok(GameMetadata {
            game_type,
            timestamp,
            proxy,
        })
    }
}

#[async_trait]
impl<M: Middleware + 'static> GameSource for DisputeGameFactoryContract<M> {
    async fn fetch_all_games_at_block(
        &self,
        earliest_timestamp: u64,
        block: u64,
    ) -> Result<Vec<GameMetadata>> {
        let count = self.get_game_count(block).await?;
        let mut games = Vec::new();
        // Games are appended in creation order, so walk backwards until leaving the window.
        for index in (0..count).rev() {
            let game = self.get_game(index, block).await?;
            if game.timestamp < earliest_timestamp {
                break;
            }
            games.push(game);
        }
        Ok(games)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ethers::{
        abi::{self, Token},
        providers::{MockProvider, Provider},
        types::Bytes,
    };

    const FACTORY: Address = Address::repeat_byte(0x24);

    fn factory() -> (DisputeGameFactoryContract<Provider<MockProvider>>, MockProvider) {
        let (provider, mock) = Provider::mocked();
        (DisputeGameFactoryContract::new(FACTORY, Arc::new(provider)), mock)
    }

    #[tokio::test]
    async fn loads_game_count() {
        let (factory, mock) = factory();
        mock.push::<Bytes, _>(Bytes::from(abi::encode(&[Token::Uint(U256::from(9876))])))
            .unwrap();
        assert_eq!(factory.get_game_count(23).await.unwrap(), 9876);
    }

    #[tokio::test]
    async fn loads_game() {
        let (factory, mock) = factory();
        let proxy = Address::repeat_byte(0xaa);
        mock.push::<Bytes, _>(Bytes::from(abi::encode(&[
            Token::Uint(U256::from(255)),
            Token::Uint(U256::from(1234)),
            Token::Address(proxy),
        ])))
        .unwrap();
        assert_eq!(
            factory.get_game(0, 23).await.unwrap(),
            GameMetadata {
                game_type: 255,
                timestamp: 1234,
                proxy,
            }
        );
    }

    fn encode_game(timestamp: u64, proxy: Address) -> Bytes {
        Bytes::from(abi::encode(&[
            Token::Uint(U256::from(255)),
            Token::Uint(U256::from(timestamp)),
            Token::Address(proxy),
        ]))
    }

    #[tokio::test]
    async fn fetches_games_inside_window_newest_first() {
        let (factory, mock) = factory();
        let game = |id: u8, timestamp: u64| GameMetadata {
            game_type: 255,
            timestamp,
            proxy: Address::repeat_byte(id),
        };
        // Responses are served last-in first-out. The bottom response must survive the fetch,
        // which proves game 0 is never requested once game 1 falls outside the window.
        mock.push::<Bytes, _>(Bytes::from(abi::encode(&[Token::Uint(U256::from(77))])))
            .unwrap();
        mock.push::<Bytes, _>(encode_game(200, Address::repeat_byte(1))).unwrap();
        mock.push::<Bytes, _>(encode_game(300, Address::repeat_byte(2))).unwrap();
        mock.push::<Bytes, _>(encode_game(400, Address::repeat_byte(3))).unwrap();
        mock.push::<Bytes, _>(Bytes::from(abi::encode(&[Token::Uint(U256::from(4))])))
            .unwrap();

        let games = factory.fetch_all_games_at_block(250, 23).await.unwrap();
        assert_eq!(games, vec![game(3, 400), game(2, 300)]);
        assert_eq!(factory.get_game_count(23).await.unwrap(), 77);
    }

    #[tokio::test]
    async fn game_at_window_start_is_included() {
        let (factory, mock) = factory();
        mock.push::<Bytes, _>(encode_game(250, Address::repeat_byte(1))).unwrap();
        mock.push::<Bytes, _>(Bytes::from(abi::encode(&[Token::Uint(U256::from(1))])))
            .unwrap();
        let games = factory.fetch_all_games_at_block(250, 23).await.unwrap();
        assert_eq!(games.len(), 1);
    }

    #[tokio::test]
    async fn rpc_failures_are_errors() {
        let (factory, _mock) = factory();
        assert!(factory.get_game_count(23).await.is_err());
    }
}
