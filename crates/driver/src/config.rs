//! The `config` module contains the [DriverConfig].

use crate::types::GameType;
use ethers::types::{Address, H256};
use std::{fmt, path::PathBuf, str::FromStr, time::Duration};
use thiserror::Error;

/// Default interval between polls of the factory.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(12);
/// Default interval between reclamations of resolved games' data.
pub const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_secs(60);
/// Default age after which games are no longer tracked.
pub const DEFAULT_GAME_WINDOW: Duration = Duration::from_secs(28 * 24 * 60 * 60);
/// Default number of confirmations to wait for before a transaction is considered included.
pub const DEFAULT_NUM_CONFIRMATIONS: usize = 1;

/// Errors found while validating a [DriverConfig].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing L1 websocket endpoint")]
    MissingL1Endpoint,
    #[error("missing private key")]
    MissingPrivateKey,
    #[error("missing datadir")]
    MissingDatadir,
    #[error("max concurrency must be greater than 0")]
    ZeroConcurrency,
    #[error("poll interval must be greater than 0")]
    ZeroPollInterval,
    #[error("trace type {0} requires an alphabet trace")]
    MissingAlphabet(TraceType),
    #[error("trace type {0} requires a rollup RPC")]
    MissingRollupRpc(TraceType),
    #[error("trace type {0} requires a cannon absolute prestate")]
    MissingCannonPrestate(TraceType),
    #[error("unknown trace type {0}")]
    UnknownTraceType(String),
}

/// The trace a challenger plays games with. Each trace type plays exactly one [GameType].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceType {
    /// The alphabet trace over the whole game.
    Alphabet,
    /// Output roots above the split depth, the alphabet trace below it.
    OutputAlphabet,
    /// Output roots above the split depth, the cannon VM trace below it.
    OutputCannon,
}

impl TraceType {
    /// Returns the game type played with this trace type.
    pub fn game_type(&self) -> GameType {
        match self {
            TraceType::Alphabet => GameType::Alphabet,
            TraceType::OutputAlphabet => GameType::OutputAlphabet,
            TraceType::OutputCannon => GameType::OutputCannon,
        }
    }

    fn uses_alphabet(&self) -> bool {
        matches!(self, TraceType::Alphabet | TraceType::OutputAlphabet)
    }

    fn uses_outputs(&self) -> bool {
        matches!(self, TraceType::OutputAlphabet | TraceType::OutputCannon)
    }
}

impl FromStr for TraceType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alphabet" => Ok(TraceType::Alphabet),
            "output-alphabet" => Ok(TraceType::OutputAlphabet),
            "output-cannon" => Ok(TraceType::OutputCannon),
            _ => Err(ConfigError::UnknownTraceType(s.to_string())),
        }
    }
}

impl fmt::Display for TraceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceType::Alphabet => write!(f, "alphabet"),
            TraceType::OutputAlphabet => write!(f, "output-alphabet"),
            TraceType::OutputCannon => write!(f, "output-cannon"),
        }
    }
}

/// The [DriverConfig] struct contains the configuration for the [Driver](crate::Driver)
/// implementations.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// The websocket endpoint of the L1 node used to index games and send transactions.
    pub l1_ws_endpoint: String,
    /// The trusted rollup node used as the source of truth for L2 output roots.
    pub rollup_rpc: Option<String>,
    /// The address of the dispute game factory contract.
    pub game_factory_address: Address,
    /// Games to play. Every game of the configured type is played when empty. Allow-listed
    /// games' data is never reclaimed.
    pub game_allowlist: Vec<Address>,
    /// The hex encoded private key used to sign transactions.
    pub private_key: String,
    /// The trace to play games with.
    pub trace_type: TraceType,
    /// The alphabet for the alphabet trace types.
    pub alphabet_trace: Option<String>,
    /// The absolute prestate of the cannon trace.
    pub cannon_absolute_prestate: Option<H256>,
    /// Whether we agree with the proposed output roots.
    pub agree_with_proposed_output: bool,
    /// The directory holding per-game data.
    pub datadir: PathBuf,
    /// The number of games progressed concurrently.
    pub max_concurrency: usize,
    /// The interval between polls of the factory.
    pub poll_interval: Duration,
    /// The interval between reclamations of resolved games' data.
    pub prune_interval: Duration,
    /// Games created longer ago than this are no longer tracked.
    pub game_window: Duration,
    /// The number of confirmations to wait for after sending a transaction.
    pub num_confirmations: usize,
}

impl DriverConfig {
    /// Creates a new [DriverConfig] with the given required values and defaults for the rest.
    pub fn new(
        l1_ws_endpoint: String,
        game_factory_address: Address,
        private_key: String,
        trace_type: TraceType,
        datadir: PathBuf,
    ) -> Self {
        Self {
            l1_ws_endpoint,
            rollup_rpc: None,
            game_factory_address,
            game_allowlist: Vec::new(),
            private_key,
            trace_type,
            alphabet_trace: None,
            cannon_absolute_prestate: None,
            agree_with_proposed_output: false,
            datadir,
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            poll_interval: DEFAULT_POLL_INTERVAL,
            prune_interval: DEFAULT_PRUNE_INTERVAL,
            game_window: DEFAULT_GAME_WINDOW,
            num_confirmations: DEFAULT_NUM_CONFIRMATIONS,
        }
    }

    /// Validates the configuration.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.l1_ws_endpoint.is_empty() {
            return Err(ConfigError::MissingL1Endpoint);
        }
        if self.private_key.is_empty() {
            return Err(ConfigError::MissingPrivateKey);
        }
        if self.datadir.as_os_str().is_empty() {
            return Err(ConfigError::MissingDatadir);
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.trace_type.uses_alphabet()
            && self.alphabet_trace.as_deref().unwrap_or_default().is_empty()
        {
            return Err(ConfigError::MissingAlphabet(self.trace_type));
        }
        if self.trace_type.uses_outputs()
            && self.rollup_rpc.as_deref().unwrap_or_default().is_empty()
        {
            return Err(ConfigError::MissingRollupRpc(self.trace_type));
        }
        if self.trace_type == TraceType::OutputCannon && self.cannon_absolute_prestate.is_none() {
            return Err(ConfigError::MissingCannonPrestate(self.trace_type));
        }
        Ok(())
    }
}
