//! Fixed-price fee estimation with percentage bumping
//!
//! The simplest [`FeeEstimator`] strategy: quotes come straight from
//! configuration, and bumps raise the highest prior fee by a configured
//! percentage (with an absolute minimum step), clipped at the per-key
//! ceiling.

use super::{FeeEstimator, FeeQuote, PriorAttempt, QuoteOpts};
use crate::error::{TxError, TxResult};
use crate::price::Wei;

use async_trait::async_trait;
use ethers::types::Bytes;
use tracing::debug;

/// Fee estimator quoting configured constants
pub struct FixedPriceEstimator {
    /// Quote dynamic fees instead of a legacy gas price
    eip1559_dynamic_fees: bool,
    /// Quoted legacy gas price
    gas_price: Wei,
    /// Quoted dynamic fee cap
    fee_cap: Wei,
    /// Quoted dynamic tip cap
    tip_cap: Wei,
    /// Percentage added on top of the highest prior fee when bumping
    bump_percent: u64,
    /// Minimum absolute bump step, for when the percentage rounds to nothing
    bump_min: Wei,
}

impl FixedPriceEstimator {
    /// Create an estimator with the default bump policy (20%, 5 gwei minimum)
    pub fn new(gas_price: Wei, fee_cap: Wei, tip_cap: Wei, eip1559_dynamic_fees: bool) -> Self {
        Self {
            eip1559_dynamic_fees,
            gas_price,
            fee_cap,
            tip_cap,
            bump_percent: 20,
            bump_min: Wei::from_gwei(5),
        }
    }

    /// Override the bump percentage and minimum step
    pub fn with_bump_policy(mut self, bump_percent: u64, bump_min: Wei) -> Self {
        self.bump_percent = bump_percent;
        self.bump_min = bump_min;
        self
    }

    /// Raise `prior` by the configured percentage, or by the minimum step if
    /// that is larger. Overflow past the 256-bit domain is an error.
    fn bumped_price(&self, prior: Wei) -> TxResult<Wei> {
        let by_percent = prior
            .checked_mul(100 + self.bump_percent)
            .ok_or_else(|| TxError::PriceOverflow(format!("bumping fee of {prior}")))?
            / 100;
        let by_min = prior
            .checked_add(self.bump_min)
            .ok_or_else(|| TxError::PriceOverflow(format!("bumping fee of {prior}")))?;
        Ok(by_percent.max(by_min))
    }
}

#[async_trait]
impl FeeEstimator for FixedPriceEstimator {
    async fn get_fee(
        &self,
        _payload: Bytes,
        fee_limit: u64,
        max_price: Wei,
        _opts: QuoteOpts,
    ) -> TxResult<(FeeQuote, u64)> {
        let quote = if self.eip1559_dynamic_fees {
            let fee_cap = self.fee_cap.min(max_price);
            let tip_cap = self.tip_cap.min(fee_cap);
            FeeQuote::dynamic(fee_cap, tip_cap)
        } else {
            FeeQuote::legacy(self.gas_price.min(max_price))
        };
        debug!(?quote, %max_price, "quoted fixed fee");
        Ok((quote, fee_limit))
    }

    async fn bump_fee(
        &self,
        previous_fee: FeeQuote,
        fee_limit: u64,
        max_price: Wei,
        prior_attempts: Vec<PriorAttempt>,
    ) -> TxResult<(FeeQuote, u64)> {
        match previous_fee {
            FeeQuote::Legacy { gas_price } => {
                // Strictly-increasing across the whole retry chain, not just
                // the immediately preceding attempt
                let prior_max = prior_attempts
                    .iter()
                    .filter_map(|a| a.fee.legacy_price())
                    .fold(gas_price, Wei::max);

                let bumped = self.bumped_price(prior_max)?.max(self.gas_price);
                let capped = bumped.min(max_price);
                if capped <= prior_max {
                    return Err(TxError::BumpExceedsCeiling {
                        bumped: capped,
                        ceiling: max_price,
                        previous: prior_max,
                    });
                }
                debug!(%capped, %prior_max, "bumped legacy gas price");
                Ok((FeeQuote::legacy(capped), fee_limit))
            }
            FeeQuote::Dynamic { fee_cap, tip_cap } => {
                let prior_max_fee_cap = prior_attempts
                    .iter()
                    .filter_map(|a| a.fee.dynamic_caps())
                    .map(|(fee_cap, _)| fee_cap)
                    .fold(fee_cap, Wei::max);
                let prior_max_tip_cap = prior_attempts
                    .iter()
                    .filter_map(|a| a.fee.dynamic_caps())
                    .map(|(_, tip_cap)| tip_cap)
                    .fold(tip_cap, Wei::max);

                let bumped_fee_cap = self
                    .bumped_price(prior_max_fee_cap)?
                    .max(self.fee_cap)
                    .min(max_price);
                if bumped_fee_cap <= prior_max_fee_cap {
                    return Err(TxError::BumpExceedsCeiling {
                        bumped: bumped_fee_cap,
                        ceiling: max_price,
                        previous: prior_max_fee_cap,
                    });
                }
                // Tip rides along but can never exceed the fee cap
                let bumped_tip_cap = self
                    .bumped_price(prior_max_tip_cap)?
                    .max(self.tip_cap)
                    .min(bumped_fee_cap);
                debug!(%bumped_fee_cap, %bumped_tip_cap, "bumped dynamic fee");
                Ok((FeeQuote::dynamic(bumped_fee_cap, bumped_tip_cap), fee_limit))
            }
        }
    }
}
