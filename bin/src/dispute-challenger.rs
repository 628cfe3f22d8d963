use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser};
use dispute_challenger_driver::{ChallengerDriver, Driver, DriverConfig, TraceType};
use ethers::types::{Address, H256};
use std::{path::PathBuf, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::Level;

/// Arguments for the `dispute-challenger` binary.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Verbosity level (0-4)
    #[arg(long, short, help = "Verbosity level (0-4)", action = ArgAction::Count, env = "VERBOSITY")]
    v: u8,

    /// The Websocket RPC endpoint of the L1 node used to index games and send transactions.
    #[arg(long, short = 'w', env = "CHALLENGER_L1_WS")]
    l1_ws_endpoint: String,

    /// The HTTP RPC endpoint of a trusted rollup node. Required for output trace types.
    #[arg(long, env = "CHALLENGER_ROLLUP_RPC")]
    rollup_rpc: Option<String>,

    /// The address of the dispute game factory contract.
    #[arg(long, short = 'f', env = "CHALLENGER_GAME_FACTORY")]
    game_factory_address: Address,

    /// Only play these games. Allow-listed games' data is never deleted.
    #[arg(long, env = "CHALLENGER_GAME_ALLOWLIST", value_delimiter = ',')]
    game_allowlist: Vec<Address>,

    /// The hex encoded private key used to sign transactions.
    #[arg(long, env = "CHALLENGER_PRIVATE_KEY", hide_env_values = true)]
    private_key: String,

    /// The trace type to play games with: alphabet, output-alphabet or output-cannon.
    #[arg(long, short = 't', env = "CHALLENGER_TRACE_TYPE")]
    trace_type: TraceType,

    /// The alphabet used by the alphabet trace types.
    #[arg(long, env = "CHALLENGER_ALPHABET")]
    alphabet: Option<String>,

    /// The absolute prestate of the cannon trace.
    #[arg(long, env = "CHALLENGER_CANNON_PRESTATE")]
    cannon_prestate: Option<H256>,

    /// Play on the side of the proposed output roots.
    #[arg(long, env = "CHALLENGER_AGREE_WITH_PROPOSED_OUTPUT")]
    agree_with_proposed_output: bool,

    /// The directory in which per-game data is stored.
    #[arg(long, short = 'd', env = "CHALLENGER_DATADIR")]
    datadir: PathBuf,

    /// The number of games progressed concurrently. Defaults to the number of CPUs.
    #[arg(long, env = "CHALLENGER_MAX_CONCURRENCY")]
    max_concurrency: Option<usize>,

    /// Seconds between polls of the dispute game factory.
    #[arg(long, env = "CHALLENGER_POLL_INTERVAL", default_value_t = 12)]
    poll_interval: u64,

    /// Seconds between deletions of resolved games' data.
    #[arg(long, env = "CHALLENGER_PRUNE_INTERVAL", default_value_t = 60)]
    prune_interval: u64,

    /// Games created more than this many seconds ago are ignored.
    #[arg(long, env = "CHALLENGER_GAME_WINDOW", default_value_t = 28 * 24 * 60 * 60)]
    game_window: u64,

    /// The number of confirmations to wait for after sending a transaction.
    #[arg(long, env = "CHALLENGER_NUM_CONFIRMATIONS", default_value_t = 1)]
    num_confirmations: usize,
}

impl Args {
    fn into_config(self) -> DriverConfig {
        let mut config = DriverConfig::new(
            self.l1_ws_endpoint,
            self.game_factory_address,
            self.private_key,
            self.trace_type,
            self.datadir,
        );
        config.rollup_rpc = self.rollup_rpc;
        config.game_allowlist = self.game_allowlist;
        config.alphabet_trace = self.alphabet;
        config.cannon_absolute_prestate = self.cannon_prestate;
        config.agree_with_proposed_output = self.agree_with_proposed_output;
        if let Some(max_concurrency) = self.max_concurrency {
            config.max_concurrency = max_concurrency;
        }
        config.poll_interval = Duration::from_secs(self.poll_interval);
        config.prune_interval = Duration::from_secs(self.prune_interval);
        config.game_window = Duration::from_secs(self.game_window);
        config.num_confirmations = self.num_confirmations;
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse the command arguments
    let args = Args::parse();

    // Initialize the tracing subscriber
    init_tracing_subscriber(args.v)?;

    let driver_config = args.into_config();
    driver_config.check()?;
    tracing::info!(target: "challenger-cli", "Driver config created successfully.");

    tracing::debug!(target: "challenger-cli", "Creating driver and connecting to websocket endpoint...");
    let driver = ChallengerDriver::try_new(driver_config).await?;
    tracing::info!(
        target: "challenger-cli",
        "Driver created successfully, websocket connected @ {}",
        &driver.config.l1_ws_endpoint
    );

    // Stop the driver on the first interrupt.
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(target: "challenger-cli", "Failed to listen for shutdown signal: {}", e);
        }
        tracing::info!(target: "challenger-cli", "Shutting down...");
        signal.cancel();
    });

    driver.start(shutdown).await
}

/// Initializes the tracing subscriber
///
/// # Arguments
/// * `verbosity_level` - The verbosity level (0-4)
///
/// # Returns
/// * `Result<()>` - Ok if successful, Err otherwise.
fn init_tracing_subscriber(verbosity_level: u8) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(match verbosity_level {
            0 => Level::ERROR,
            1 => Level::WARN,
            2 => Level::INFO,
            3 => Level::DEBUG,
            _ => Level::TRACE,
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber).map_err(|e| anyhow!(e))
}
