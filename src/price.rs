//! Wei-denominated price type with overflow-checked arithmetic
//!
//! All fee math in the crate goes through [`Wei`] so that a quote that would
//! exceed the 256-bit EVM numeric domain surfaces as an error instead of
//! wrapping around.

use ethers::types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Div;
use std::str::FromStr;
use thiserror::Error;

/// A non-negative wei quantity, capped at 2^256 - 1.
///
/// Total-ordered, displayed and serialized as a canonical decimal string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Wei(U256);

/// Error parsing a decimal wei string
#[derive(Error, Debug)]
#[error("invalid wei amount {input:?}: {reason}")]
pub struct ParseWeiError {
    input: String,
    reason: String,
}

impl Wei {
    pub const ZERO: Wei = Wei(U256::zero());
    pub const MAX: Wei = Wei(U256::MAX);

    /// Wrap a raw wei amount
    pub fn from_wei<T: Into<U256>>(amount: T) -> Self {
        Wei(amount.into())
    }

    /// Convenience constructor for gwei-denominated config values
    pub fn from_gwei(gwei: u64) -> Self {
        Wei(U256::from(gwei) * U256::from(1_000_000_000u64))
    }

    /// Addition that reports overflow instead of wrapping
    pub fn checked_add(self, rhs: Wei) -> Option<Wei> {
        self.0.checked_add(rhs.0).map(Wei)
    }

    /// Scalar multiplication that reports overflow instead of wrapping
    pub fn checked_mul(self, rhs: u64) -> Option<Wei> {
        self.0.checked_mul(U256::from(rhs)).map(Wei)
    }

    /// Addition clamped at the domain ceiling
    pub fn saturating_add(self, rhs: Wei) -> Wei {
        Wei(self.0.saturating_add(rhs.0))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }
}

impl From<U256> for Wei {
    fn from(value: U256) -> Self {
        Wei(value)
    }
}

impl From<u64> for Wei {
    fn from(value: u64) -> Self {
        Wei(U256::from(value))
    }
}

impl Div<u64> for Wei {
    type Output = Wei;

    fn div(self, rhs: u64) -> Wei {
        Wei(self.0 / U256::from(rhs))
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // U256 renders as decimal, which is the canonical form
        write!(f, "{}", self.0)
    }
}

impl FromStr for Wei {
    type Err = ParseWeiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_dec_str(s.trim())
            .map(Wei)
            .map_err(|e| ParseWeiError {
                input: s.to_string(),
                reason: e.to_string(),
            })
    }
}

impl Serialize for Wei {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Wei {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
