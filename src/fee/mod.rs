//! Fee quotes and the estimator capability
//!
//! This module defines the contract between the attempt builder and whatever
//! prices transactions: a closed [`FeeQuote`] sum type over the two EVM fee
//! models, and the [`FeeEstimator`] trait with its quote and bump entry
//! points. Concrete strategies live behind the trait; [`fixed`] ships the
//! simplest one.

pub mod fixed;

pub use fixed::FixedPriceEstimator;

use crate::error::TxResult;
use crate::price::Wei;

use async_trait::async_trait;
use ethers::types::{Bytes, H256};
use serde::{Deserialize, Serialize};

/// A fee quote for exactly one of the two EVM transaction fee models.
///
/// Legacy carries a single gas price; dynamic (EIP-1559) carries a fee cap
/// and a tip cap. Whether the variant matches the requested transaction type
/// is checked at attempt construction, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeeQuote {
    Legacy { gas_price: Wei },
    Dynamic { fee_cap: Wei, tip_cap: Wei },
}

impl FeeQuote {
    pub fn legacy(gas_price: Wei) -> Self {
        FeeQuote::Legacy { gas_price }
    }

    pub fn dynamic(fee_cap: Wei, tip_cap: Wei) -> Self {
        FeeQuote::Dynamic { fee_cap, tip_cap }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, FeeQuote::Legacy { .. })
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, FeeQuote::Dynamic { .. })
    }

    /// The legacy gas price, if this is a legacy quote
    pub fn legacy_price(&self) -> Option<Wei> {
        match self {
            FeeQuote::Legacy { gas_price } => Some(*gas_price),
            FeeQuote::Dynamic { .. } => None,
        }
    }

    /// The (fee cap, tip cap) pair, if this is a dynamic quote
    pub fn dynamic_caps(&self) -> Option<(Wei, Wei)> {
        match self {
            FeeQuote::Legacy { .. } => None,
            FeeQuote::Dynamic { fee_cap, tip_cap } => Some((*fee_cap, *tip_cap)),
        }
    }

    /// The most a single gas unit can cost under this quote.
    ///
    /// Used to compare fees across attempts of the same family when checking
    /// bump monotonicity.
    pub fn max_unit_price(&self) -> Wei {
        match self {
            FeeQuote::Legacy { gas_price } => *gas_price,
            FeeQuote::Dynamic { fee_cap, .. } => *fee_cap,
        }
    }

    /// Variant name for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            FeeQuote::Legacy { .. } => "legacy",
            FeeQuote::Dynamic { .. } => "dynamic",
        }
    }
}

/// Projection of a prior attempt handed to the estimator's bump entry point,
/// so it can enforce strictly-increasing fees across the whole retry chain.
#[derive(Debug, Clone)]
pub struct PriorAttempt {
    pub fee: FeeQuote,
    pub gas_limit: u64,
    pub tx_hash: H256,
    pub tx_type: u8,
    pub broadcast_before_block_num: Option<u64>,
}

/// Caller hints for a fee quote request
#[derive(Debug, Clone, Copy, Default)]
pub struct QuoteOpts {
    /// Bypass any quote caching the estimator does
    pub force_refetch: bool,
}

/// Capability interface for fee estimation strategies.
///
/// Implementations may hit the network or cryptographic hardware; both entry
/// points must honor caller cancellation (futures dropped on deadline).
/// Transient failures are reported as [`crate::TxError::FeeEstimation`] and
/// are retryable; a bump that cannot exceed prior fees under the ceiling is
/// reported as [`crate::TxError::BumpExceedsCeiling`] and is not.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeeEstimator: Send + Sync {
    /// Quote a fee and gas limit for a fresh attempt.
    ///
    /// `max_price` is the per-source-address configured ceiling; the returned
    /// quote must not exceed it.
    async fn get_fee(
        &self,
        payload: Bytes,
        fee_limit: u64,
        max_price: Wei,
        opts: QuoteOpts,
    ) -> TxResult<(FeeQuote, u64)>;

    /// Quote a fee strictly greater than every prior attempt's, clipped at
    /// `max_price`.
    async fn bump_fee(
        &self,
        previous_fee: FeeQuote,
        fee_limit: u64,
        max_price: Wei,
        prior_attempts: Vec<PriorAttempt>,
    ) -> TxResult<(FeeQuote, u64)>;
}
