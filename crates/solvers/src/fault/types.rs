//! The types module contains all of the types relevant to the fault dispute game.

use ethers::types::{Bytes, H256, U256};
use serde::{Deserialize, Serialize};

/// The [Claim] type represents a claim on the execution trace at a given trace index that is
/// made by a participant in a dispute game.
pub type Claim = H256;

/// The sentinel parent index of the root claim.
pub const ROOT_PARENT_INDEX: u32 = u32::MAX;

/// The [Clock] struct represents a clock that is used to track the duration and timestamp of a
/// given [Claim] within the game.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    /// The duration elapsed on the chess clock.
    pub duration: u64,
    /// The timestamp at which the clock was last updated.
    pub timestamp: u64,
}

impl From<u128> for Clock {
    /// Unpacks an on-chain clock, `duration (uint64) ‖ timestamp (uint64)`.
    fn from(packed: u128) -> Self {
        Self {
            duration: (packed >> 64) as u64,
            timestamp: packed as u64,
        }
    }
}

/// The [ClaimData] struct represents a [Claim] as well as the data associated with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimData {
    /// The index of the claim in the DAG array.
    pub contract_index: usize,
    /// The index of the parent claim in the DAG array. [ROOT_PARENT_INDEX] for the root claim.
    pub parent_index: u32,
    /// Whether or not the current claim has ever been countered.
    pub countered: bool,
    /// The claim that is being made at the trace index relative to the position.
    pub claim: Claim,
    /// The position of the claim within the game tree.
    pub position: u128,
    /// The clock that is used to track the duration elapsed and timestamp of the claim.
    pub clock: Clock,
}

impl ClaimData {
    /// Returns true if the claim is the root claim of the game.
    pub fn is_root(&self) -> bool {
        self.parent_index == ROOT_PARENT_INDEX
    }
}

/// The [PreimageOracleData] struct holds the data that must be loaded into the preimage oracle
/// before a step can be executed on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreimageOracleData {
    /// Local data is bound to the game and loaded through it; global data is loaded directly
    /// into the oracle.
    pub is_local: bool,
    /// The key of the preimage.
    pub oracle_key: Bytes,
    /// The preimage, prefixed with its 8 byte big-endian length.
    pub oracle_data: Bytes,
    /// The offset within the preimage to load.
    pub oracle_offset: u32,
}

impl PreimageOracleData {
    /// Returns the local data identifier, the oracle key interpreted as a `uint256`.
    pub fn local_ident(&self) -> U256 {
        U256::from_big_endian(&self.oracle_key)
    }

    /// Returns the preimage without its length prefix.
    pub fn preimage_without_size(&self) -> Bytes {
        self.oracle_data
            .get(8..)
            .map(|data| Bytes::from(data.to_vec()))
            .unwrap_or_default()
    }
}

/// The [TraceStepData] struct holds the pre-state, proof and oracle data required to execute a
/// single step of the trace on-chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceStepData {
    /// The encoded state prior to the step.
    pub pre_state: Bytes,
    /// The proof data for the step.
    pub proof: Bytes,
    /// Preimage data required by the step, if any.
    pub oracle_data: Option<PreimageOracleData>,
}

/// An [Action] is a move taken by a participant in the dispute game in response to
/// a claim made by another participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Create a counter claim against the claim at `parent_index`.
    Move {
        /// The contract index of the claim being countered.
        parent_index: usize,
        /// True for an attack, false for a defense.
        is_attack: bool,
        /// Our value at the new position.
        value: Claim,
    },
    /// Perform a VM step against the leaf claim at `parent_index`.
    Step {
        /// The contract index of the leaf claim.
        parent_index: usize,
        /// True if the step attacks the leaf claim.
        is_attack: bool,
        /// The encoded pre-state of the step.
        pre_state: Bytes,
        /// The proof data of the step.
        proof: Bytes,
        /// Preimage data to load before the step.
        oracle_data: Option<PreimageOracleData>,
    },
}

impl Action {
    /// Returns the contract index of the claim this [Action] responds to.
    pub fn parent_index(&self) -> usize {
        match self {
            Action::Move { parent_index, .. } | Action::Step { parent_index, .. } => *parent_index,
        }
    }

    /// Returns true if this [Action] is an attack.
    pub fn is_attack(&self) -> bool {
        match self {
            Action::Move { is_attack, .. } | Action::Step { is_attack, .. } => *is_attack,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn clock_unpacks_duration_and_timestamp() {
        let packed = (7u128 << 64) | 1_700_000_000u128;
        let clock = Clock::from(packed);
        assert_eq!(clock.duration, 7);
        assert_eq!(clock.timestamp, 1_700_000_000);
    }

    #[test]
    fn preimage_strips_length_prefix() {
        let data = PreimageOracleData {
            is_local: false,
            oracle_key: Bytes::from(vec![0u8; 32]),
            oracle_data: Bytes::from(vec![0, 0, 0, 0, 0, 0, 0, 3, 0xaa, 0xbb, 0xcc]),
            oracle_offset: 0,
        };
        assert_eq!(data.preimage_without_size(), Bytes::from(vec![0xaa, 0xbb, 0xcc]));
    }

    #[test]
    fn local_ident_reads_key_as_uint() {
        let mut key = vec![0u8; 32];
        key[31] = 4;
        let data = PreimageOracleData {
            is_local: true,
            oracle_key: Bytes::from(key),
            oracle_data: Bytes::default(),
            oracle_offset: 0,
        };
        assert_eq!(data.local_ident(), U256::from(4));
    }
}
