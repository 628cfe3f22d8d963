//! The alphabet trace: a deterministic toy VM whose state at trace index `i` is the `i`th
//! letter of a string.

use super::{check_depth, TraceError, TraceProvider};
use crate::fault::{Claim, Position, TraceStepData};
use async_trait::async_trait;
use ethers::{
    abi::{self, Token},
    types::{Bytes, H256, U256},
    utils::keccak256,
};

/// VM status byte of a claim that has not reached a final state.
const VM_STATUS_INVALID: u8 = 1;
/// VM status byte of the absolute prestate.
const VM_STATUS_UNFINISHED: u8 = 3;
/// The letter preceding `a`, used as the absolute prestate.
const PRESTATE_LETTER: u8 = 0x60;

/// A [TraceProvider] over a fixed alphabet. Trace indices past the end of the alphabet repeat
/// the final letter.
#[derive(Debug, Clone)]
pub struct AlphabetTraceProvider {
    /// Our full execution trace.
    state: Vec<u8>,
    /// The depth of the trace tree.
    depth: u64,
}

impl AlphabetTraceProvider {
    /// Creates a new [AlphabetTraceProvider] from the letters of `alphabet`.
    pub fn new(alphabet: &str, depth: u64) -> Self {
        Self {
            state: alphabet.bytes().collect(),
            depth,
        }
    }

    /// The encoded absolute prestate.
    pub fn absolute_prestate() -> Bytes {
        abi::encode(&[Token::Uint(U256::from(PRESTATE_LETTER))]).into()
    }

    /// Encodes the state at `trace_index`: `abi.encode(uint256 index, uint256 letter)`.
    pub fn build_preimage(trace_index: u128, letter: u8) -> Bytes {
        abi::encode(&[
            Token::Uint(U256::from(trace_index)),
            Token::Uint(U256::from(letter)),
        ])
        .into()
    }

    /// Returns the state preceding `trace_index`.
    fn pre_state_at(&self, trace_index: u128) -> Result<Bytes, TraceError> {
        if trace_index == 0 {
            return Ok(Self::absolute_prestate());
        }
        let index = trace_index - 1;
        if index >= 1u128 << self.depth {
            return Err(TraceError::IndexTooLarge(index));
        }
        match self.state.last() {
            None => Ok(Self::absolute_prestate()),
            Some(last) if index >= self.state.len() as u128 => {
                Ok(Self::build_preimage(self.state.len() as u128 - 1, *last))
            }
            Some(_) => Ok(Self::build_preimage(index, self.state[index as usize])),
        }
    }
}

/// Hashes an alphabet state into a claim.
fn state_hash(state: &[u8], status: u8) -> Claim {
    let mut hash = keccak256(state);
    hash[0] = status;
    H256::from(hash)
}

#[async_trait]
impl TraceProvider for AlphabetTraceProvider {
    async fn get(&self, position: u128) -> Result<Claim, TraceError> {
        check_depth(position, self.depth)?;
        // The pre-state of the next index is the state at this one.
        let state = self.pre_state_at(position.trace_index(self.depth) + 1)?;
        Ok(state_hash(&state, VM_STATUS_INVALID))
    }

    async fn get_step_data(&self, position: u128) -> Result<TraceStepData, TraceError> {
        check_depth(position, self.depth)?;
        Ok(TraceStepData {
            pre_state: self.pre_state_at(position.trace_index(self.depth))?,
            proof: Bytes::default(),
            oracle_data: None,
        })
    }

    async fn absolute_prestate_commitment(&self) -> Result<Claim, TraceError> {
        Ok(state_hash(&Self::absolute_prestate(), VM_STATUS_UNFINISHED))
    }
}
