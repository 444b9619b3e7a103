//! Intent and attempt records
//!
//! A [`PendingTx`] is a unit of work the node wants mined; each broadcast
//! candidate derived from it is a [`TxAttempt`]. Attempts are append-only:
//! a retry produces a new attempt object, never a mutation.

use crate::fee::{FeeQuote, PriorAttempt};

use chrono::{DateTime, Utc};
use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// EVM transaction type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxType {
    /// Type 0, priced by a single gas price
    Legacy,
    /// Type 2 (EIP-1559), priced by a fee cap / tip cap pair
    DynamicFee,
}

impl TxType {
    /// The on-chain type tag
    pub fn tag(self) -> u8 {
        match self {
            TxType::Legacy => 0,
            TxType::DynamicFee => 2,
        }
    }

    /// Parse an on-chain type tag
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(TxType::Legacy),
            2 => Some(TxType::DynamicFee),
            _ => None,
        }
    }
}

/// Lifecycle state of an attempt.
///
/// This crate only produces `InProgress`; the confirmation watcher owns the
/// transitions to the other states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    InProgress,
    Broadcast,
    Confirmed,
    TimedOut,
}

/// A pending transaction intent awaiting broadcast.
///
/// Immutable once an attempt is built from it, except for the sequence
/// number, which is assigned exactly once by the external broadcaster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTx {
    pub id: Uuid,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub encoded_payload: Bytes,
    /// Maximum gas units the caller is willing to spend
    pub fee_limit: u64,
    /// Per-source-address sequence number, assigned at broadcast time
    pub sequence: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl PendingTx {
    pub fn new(from: Address, to: Address, value: U256, payload: Bytes, fee_limit: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
            value,
            encoded_payload: payload,
            fee_limit,
            sequence: None,
            created_at: Utc::now(),
        }
    }
}

/// One concrete, signed broadcast candidate for a [`PendingTx`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxAttempt {
    pub id: Uuid,
    pub tx_id: Uuid,
    pub state: AttemptState,
    pub tx_type: TxType,
    pub fee: FeeQuote,
    pub gas_limit: u64,
    pub signed_raw_tx: Bytes,
    /// keccak256 of the signed envelope
    pub hash: H256,
    /// Set by the broadcaster; lets the estimator judge how long an attempt
    /// has been waiting when bumping
    pub broadcast_before_block_num: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl TxAttempt {
    /// Project this attempt into the form the estimator's bump entry point
    /// consumes
    pub fn as_prior(&self) -> PriorAttempt {
        PriorAttempt {
            fee: self.fee,
            gas_limit: self.gas_limit,
            tx_hash: self.hash,
            tx_type: self.tx_type.tag(),
            broadcast_before_block_num: self.broadcast_before_block_num,
        }
    }
}
