#![doc = include_str!("../README.md")]

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::{
    middleware::SignerMiddleware,
    providers::{Middleware, Provider, Ws},
    signers::{LocalWallet, Signer},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Contains the smart contract bindings used by the driver.
mod bindings;

pub mod agent;
pub mod config;
pub mod contracts;
pub mod disk;
pub mod monitor;
pub mod outputs;
pub mod player;
pub mod registry;
pub mod responder;
pub mod scheduler;
pub mod txmgr;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{ConfigError, DriverConfig, TraceType};
pub use types::{GameMetadata, GameStatus, GameType, SignerMiddlewareWS};

use contracts::DisputeGameFactoryContract;
use disk::GameDirectories;
use monitor::{ClientHeadSource, GameMonitor};
use outputs::{OutputRootSource, RollupClient};
use player::FaultPlayerCreator;
use scheduler::{Scheduler, SchedulerConfig};
use txmgr::SimpleTxManager;

/// The [Driver] trait defines the interface for the service loops ran by the `dispute-challenger`
/// binary.
#[async_trait]
pub trait Driver {
    /// Creates a new [Driver] with the given configuration.
    async fn try_new(config: DriverConfig) -> Result<Self>
    where
        Self: Sized;

    /// Runs the [Driver] until `shutdown` is cancelled.
    async fn start(self, shutdown: CancellationToken) -> Result<()>;
}

/// The [ChallengerDriver] monitors the dispute game factory and plays every game in scope.
pub struct ChallengerDriver {
    /// The configuration for the driver.
    pub config: DriverConfig,
    /// The provider used to index games and send transactions.
    pub(crate) l1_provider: Arc<SignerMiddlewareWS>,
    /// The trusted source of L2 output roots, for output trace types.
    pub(crate) rollup: Option<Arc<dyn OutputRootSource>>,
}

#[async_trait]
impl Driver for ChallengerDriver {
    async fn try_new(config: DriverConfig) -> Result<Self> {
        config.check()?;

        let provider = Provider::<Ws>::connect(config.l1_ws_endpoint.clone())
            .await
            .context("failed to connect to the L1 node")?;
        let chain_id = provider
            .get_chainid()
            .await
            .context("failed to fetch the L1 chain id")?;
        let wallet = config
            .private_key
            .parse::<LocalWallet>()
            .context("invalid private key")?
            .with_chain_id(chain_id.as_u64());
        tracing::info!(
            target: "challenger-cli",
            "Connected to L1 chain {} as {:?}",
            chain_id,
            wallet.address()
        );
        let l1_provider = Arc::new(SignerMiddleware::new(provider, wallet));

        let rollup = match config.rollup_rpc.as_deref() {
            Some(url) => {
                let client: Arc<dyn OutputRootSource> = Arc::new(RollupClient::try_new(url)?);
                Some(client)
            }
            None => None,
        };

        Ok(Self {
            config,
            l1_provider,
            rollup,
        })
    }

    async fn start(self, shutdown: CancellationToken) -> Result<()> {
        let config = &self.config;
        let tx_mgr = Arc::new(SimpleTxManager::new(
            Arc::clone(&self.l1_provider),
            config.num_confirmations,
        ));
        let resources = registry::resource_creator(config, self.rollup.clone())?;
        let creator = Arc::new(FaultPlayerCreator::new(
            Arc::clone(&self.l1_provider),
            tx_mgr,
            resources,
            config.agree_with_proposed_output,
        ));

        let scheduler = Scheduler::start(
            creator,
            Arc::new(GameDirectories::new(config.datadir.clone())),
            SchedulerConfig {
                max_concurrency: config.max_concurrency,
                prune_interval: config.prune_interval,
                protected_games: config.game_allowlist.clone(),
            },
            &shutdown,
        );

        let monitor = GameMonitor::new(
            Arc::new(DisputeGameFactoryContract::new(
                config.game_factory_address,
                Arc::clone(&self.l1_provider),
            )),
            Arc::new(ClientHeadSource(Arc::clone(&self.l1_provider))),
            config.poll_interval,
            config.game_window,
            config.game_allowlist.clone(),
            config.trace_type.game_type() as u8,
        );
        tracing::info!(
            target: "challenger-cli",
            "Challenger started. Factory: {:?}, trace type: {}",
            config.game_factory_address,
            config.trace_type
        );

        monitor.run(&scheduler, shutdown).await;
        scheduler.close().await;
        tracing::info!(target: "challenger-cli", "Challenger stopped");
        Ok(())
    }
}
