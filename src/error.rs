//! Error types for attempt construction and fee bumping
//!
//! Every failure is classified as retryable (transient, the caller may safely
//! recreate the attempt) or fatal (misconfiguration or an estimator/caller
//! bug; progress on that attempt must halt and an operator should look).

use crate::price::Wei;
use ethers::types::Address;
use thiserror::Error;
use uuid::Uuid;

/// Main error type for attempt construction
#[derive(Error, Debug)]
pub enum TxError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fee estimation error: {0}")]
    FeeEstimation(String),

    #[error("Attempt for tx {tx_id} is a type {tx_type} transaction but the estimator returned a {quote} quote")]
    FeeMismatch {
        tx_id: Uuid,
        tx_type: u8,
        quote: &'static str,
    },

    #[error("Attempt for tx {tx_id} had unrecognised transaction type {tx_type}")]
    UnknownTxType { tx_id: Uuid, tx_type: u8 },

    #[error("specified gas price of {price} would exceed max configured gas price of {ceiling} for key {key:?}")]
    GasPriceAboveCeiling {
        price: Wei,
        ceiling: Wei,
        key: Address,
    },

    #[error("specified gas price of {price} is below min configured gas price of {floor} for key {key:?}")]
    GasPriceBelowFloor { price: Wei, floor: Wei, key: Address },

    #[error("gas fee cap must be greater than or equal to gas tip cap (fee cap: {fee_cap}, tip cap: {tip_cap})")]
    FeeCapBelowTipCap { fee_cap: Wei, tip_cap: Wei },

    #[error("specified gas tip cap of {tip_cap} is below min configured gas tip of {floor} for key {key:?}")]
    TipCapBelowMinimum { tip_cap: Wei, floor: Wei, key: Address },

    #[error("Price arithmetic overflowed the 256-bit domain: {0}")]
    PriceOverflow(String),

    #[error("bump attempt of {bumped} capped at max configured price {ceiling} would not exceed previous fee of {previous}")]
    BumpExceedsCeiling {
        bumped: Wei,
        ceiling: Wei,
        previous: Wei,
    },

    #[error("bumped fee of {bumped} does not exceed highest prior attempt fee of {prior_max}")]
    BumpBelowPrior { bumped: Wei, prior_max: Wei },

    #[error("Tx {tx_id} has no sequence number assigned")]
    SequenceUnassigned { tx_id: Uuid },

    #[error("Signing error for account {address:?}: {message}")]
    Signing { address: Address, message: String },
}

impl TxError {
    /// Check if the caller may safely recreate the attempt.
    ///
    /// Only transient estimator failures qualify; everything else indicates
    /// misconfiguration or a bug upstream of this crate.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TxError::FeeEstimation(_))
    }

    /// Check if error should reach the operator alert channel
    pub fn should_alert(&self) -> bool {
        !matches!(self, TxError::Config(_) | TxError::FeeEstimation(_))
    }
}

/// Result type for attempt construction operations
pub type TxResult<T> = Result<T, TxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimator_errors_are_retryable() {
        assert!(TxError::FeeEstimation("gas service down".into()).is_retryable());
    }

    #[test]
    fn test_validation_errors_are_fatal_and_alertable() {
        let err = TxError::GasPriceAboveCeiling {
            price: Wei::from(100u64),
            ceiling: Wei::from(50u64),
            key: Address::zero(),
        };
        assert!(!err.is_retryable());
        assert!(err.should_alert());
    }

    #[test]
    fn test_bump_ceiling_error_is_fatal() {
        let err = TxError::BumpExceedsCeiling {
            bumped: Wei::from(18u64),
            ceiling: Wei::from(15u64),
            previous: Wei::from(15u64),
        };
        assert!(!err.is_retryable());
        assert!(err.should_alert());
    }
}
