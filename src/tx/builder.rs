//! Attempt construction
//!
//! [`AttemptBuilder`] turns a pending intent plus a fee quote into a signed,
//! type-correct [`TxAttempt`]. It is a stateless transformation stage: no
//! shared mutable state, no locks held across the estimator or signer calls,
//! safe to invoke concurrently for different intents.

use super::signer::{sign_and_encode, AttemptSigner};
use super::types::{AttemptState, PendingTx, TxAttempt, TxType};
use super::validation;
use crate::config::FeeConfig;
use crate::error::{TxError, TxResult};
use crate::fee::{FeeEstimator, FeeQuote, QuoteOpts};
use crate::price::Wei;

use chrono::Utc;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Eip1559TransactionRequest, TransactionRequest, U256};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Builds signed transaction attempts from pending intents
pub struct AttemptBuilder {
    chain_id: u64,
    fee_config: Arc<dyn FeeConfig>,
    estimator: Arc<dyn FeeEstimator>,
    keystore: Arc<dyn AttemptSigner>,
}

impl AttemptBuilder {
    pub fn new(
        chain_id: u64,
        fee_config: Arc<dyn FeeConfig>,
        estimator: Arc<dyn FeeEstimator>,
        keystore: Arc<dyn AttemptSigner>,
    ) -> Self {
        Self {
            chain_id,
            fee_config,
            estimator,
            keystore,
        }
    }

    /// Build a fresh attempt, determining the transaction type from
    /// configuration and pricing it through the estimator.
    ///
    /// Estimator failures are retryable: a pricing service outage must not
    /// poison the intent.
    pub async fn new_attempt(&self, etx: &PendingTx, opts: QuoteOpts) -> TxResult<TxAttempt> {
        let tx_type = if self.fee_config.eip1559_dynamic_fees() {
            TxType::DynamicFee.tag()
        } else {
            TxType::Legacy.tag()
        };
        self.new_attempt_with_type(etx, tx_type, opts).await
    }

    /// Build an attempt with a caller-supplied transaction type.
    ///
    /// Used when a network requires downgrading to legacy pricing after a
    /// failed dynamic-fee broadcast. The caller must keep the type consistent
    /// with what the estimator will quote.
    pub async fn new_attempt_with_type(
        &self,
        etx: &PendingTx,
        tx_type: u8,
        opts: QuoteOpts,
    ) -> TxResult<TxAttempt> {
        let max_price = self.fee_config.price_max_key(etx.from);
        let (fee, gas_limit) = self
            .estimator
            .get_fee(etx.encoded_payload.clone(), etx.fee_limit, max_price, opts)
            .await?;
        debug!(tx_id = %etx.id, ?fee, gas_limit, "received fee quote");

        self.new_custom_attempt(etx, fee, gas_limit, tx_type).await
    }

    /// Build an attempt with a fee bumped above every prior attempt.
    ///
    /// The transaction type never changes across bumps; the previous
    /// attempt's type is reused. The full prior history is handed to the
    /// estimator so it can enforce monotonicity across the whole retry
    /// chain, and the builder independently verifies the result before
    /// signing anything.
    pub async fn new_bump_attempt(
        &self,
        etx: &PendingTx,
        previous: &TxAttempt,
        prior_attempts: &[TxAttempt],
    ) -> TxResult<TxAttempt> {
        let max_price = self.fee_config.price_max_key(etx.from);
        let priors = prior_attempts.iter().map(TxAttempt::as_prior).collect();

        let (bumped, gas_limit) = self
            .estimator
            .bump_fee(previous.fee, etx.fee_limit, max_price, priors)
            .await?;
        debug!(tx_id = %etx.id, ?bumped, gas_limit, "received bumped fee quote");

        // Enforcement point: never sign a bump that fails to outbid the
        // retry chain, whatever the estimator claims
        let prior_max = prior_attempts
            .iter()
            .map(|a| &a.fee)
            .chain(std::iter::once(&previous.fee))
            .filter(|fee| fee.kind() == bumped.kind())
            .map(FeeQuote::max_unit_price)
            .max();
        if let Some(prior_max) = prior_max {
            if bumped.max_unit_price() <= prior_max {
                let err = TxError::BumpBelowPrior {
                    bumped: bumped.max_unit_price(),
                    prior_max,
                };
                error!(target: "assumption_violation", tx_id = %etx.id, %err);
                return Err(err);
            }
        }

        self.new_custom_attempt(etx, bumped, gas_limit, previous.tx_type.tag())
            .await
    }

    /// Build an attempt from explicit fee parameters and transaction type.
    ///
    /// The only entry point usable without an estimator (forced or manual
    /// rebroadcast). A quote variant that does not match the requested type,
    /// or an unrecognised type tag, is an assumption violation: fatal,
    /// non-retryable, and alerted.
    pub async fn new_custom_attempt(
        &self,
        etx: &PendingTx,
        fee: FeeQuote,
        gas_limit: u64,
        tx_type: u8,
    ) -> TxResult<TxAttempt> {
        match TxType::from_tag(tx_type) {
            Some(TxType::Legacy) => {
                let Some(gas_price) = fee.legacy_price() else {
                    let err = TxError::FeeMismatch {
                        tx_id: etx.id,
                        tx_type,
                        quote: fee.kind(),
                    };
                    error!(target: "assumption_violation", %err);
                    return Err(err);
                };
                self.new_legacy_attempt(etx, gas_price, gas_limit).await
            }
            Some(TxType::DynamicFee) => {
                let Some((fee_cap, tip_cap)) = fee.dynamic_caps() else {
                    let err = TxError::FeeMismatch {
                        tx_id: etx.id,
                        tx_type,
                        quote: fee.kind(),
                    };
                    error!(target: "assumption_violation", %err);
                    return Err(err);
                };
                self.new_dynamic_fee_attempt(etx, fee_cap, tip_cap, gas_limit)
                    .await
            }
            None => {
                let err = TxError::UnknownTxType {
                    tx_id: etx.id,
                    tx_type,
                };
                error!(target: "assumption_violation", %err);
                Err(err)
            }
        }
    }

    /// Build a signed zero-value, zero-destination legacy attempt.
    ///
    /// Used to force a low-value transaction through a stuck sequence
    /// number. Requires a legacy quote.
    pub async fn new_empty_attempt(
        &self,
        sequence: u64,
        fee_limit: u64,
        fee: FeeQuote,
        from: Address,
    ) -> TxResult<TxAttempt> {
        let Some(gas_price) = fee.legacy_price() else {
            return Err(TxError::FeeMismatch {
                tx_id: Uuid::nil(),
                tx_type: TxType::Legacy.tag(),
                quote: fee.kind(),
            });
        };

        let tx: TypedTransaction = TransactionRequest::new()
            .to(Address::zero())
            .value(U256::zero())
            .nonce(sequence)
            .gas(fee_limit)
            .gas_price(gas_price.as_u256())
            .data(Bytes::new())
            .chain_id(self.chain_id)
            .into();

        self.sign_into_attempt(Uuid::nil(), from, tx, fee, fee_limit, TxType::Legacy)
            .await
    }

    async fn new_legacy_attempt(
        &self,
        etx: &PendingTx,
        gas_price: Wei,
        gas_limit: u64,
    ) -> TxResult<TxAttempt> {
        validation::validate_legacy_gas(self.fee_config.as_ref(), gas_price, etx.from).map_err(
            |err| {
                error!(target: "assumption_violation", tx_id = %etx.id, %err, "invalid gas parameters");
                err
            },
        )?;

        let sequence = etx
            .sequence
            .ok_or(TxError::SequenceUnassigned { tx_id: etx.id })?;

        let tx: TypedTransaction = TransactionRequest::new()
            .to(etx.to)
            .value(etx.value)
            .nonce(sequence)
            .gas(gas_limit)
            .gas_price(gas_price.as_u256())
            .data(etx.encoded_payload.clone())
            .chain_id(self.chain_id)
            .into();

        self.sign_into_attempt(
            etx.id,
            etx.from,
            tx,
            FeeQuote::legacy(gas_price),
            gas_limit,
            TxType::Legacy,
        )
        .await
    }

    async fn new_dynamic_fee_attempt(
        &self,
        etx: &PendingTx,
        fee_cap: Wei,
        tip_cap: Wei,
        gas_limit: u64,
    ) -> TxResult<TxAttempt> {
        validation::validate_dynamic_fee_gas(self.fee_config.as_ref(), fee_cap, tip_cap, etx.from)
            .map_err(|err| {
                error!(target: "assumption_violation", tx_id = %etx.id, %err, "invalid gas parameters");
                err
            })?;

        let sequence = etx
            .sequence
            .ok_or(TxError::SequenceUnassigned { tx_id: etx.id })?;

        let tx = TypedTransaction::Eip1559(
            Eip1559TransactionRequest::new()
                .to(etx.to)
                .value(etx.value)
                .nonce(sequence)
                .gas(gas_limit)
                .max_fee_per_gas(fee_cap.as_u256())
                .max_priority_fee_per_gas(tip_cap.as_u256())
                .data(etx.encoded_payload.clone())
                .chain_id(self.chain_id),
        );

        self.sign_into_attempt(
            etx.id,
            etx.from,
            tx,
            FeeQuote::dynamic(fee_cap, tip_cap),
            gas_limit,
            TxType::DynamicFee,
        )
        .await
    }

    async fn sign_into_attempt(
        &self,
        tx_id: Uuid,
        from: Address,
        tx: TypedTransaction,
        fee: FeeQuote,
        gas_limit: u64,
        tx_type: TxType,
    ) -> TxResult<TxAttempt> {
        let (hash, signed_raw_tx) =
            sign_and_encode(self.keystore.as_ref(), from, &tx, self.chain_id).await?;
        debug!(%tx_id, ?hash, tx_type = tx_type.tag(), "signed attempt");

        Ok(TxAttempt {
            id: Uuid::new_v4(),
            tx_id,
            state: AttemptState::InProgress,
            tx_type,
            fee,
            gas_limit,
            signed_raw_tx,
            hash,
            broadcast_before_block_num: None,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeeSettings;
    use crate::fee::{FixedPriceEstimator, MockFeeEstimator};
    use crate::tx::signer::InMemoryKeystore;
    use ethers::signers::{LocalWallet, Signer};
    use ethers::types::NameOrAddress;
    use ethers::utils::rlp::Rlp;
    use std::collections::HashMap;

    const CHAIN_ID: u64 = 1337;

    fn settings(floor: u64, ceiling: u64, tip_floor: u64, eip1559: bool) -> FeeSettings {
        FeeSettings {
            eip1559_dynamic_fees: eip1559,
            price_min: Wei::from(floor),
            tip_cap_min: Wei::from(tip_floor),
            price_max_default: Wei::from(ceiling),
            price_max_keys: HashMap::new(),
        }
    }

    fn test_wallet() -> LocalWallet {
        "0000000000000000000000000000000000000000000000000000000000000001"
            .parse()
            .unwrap()
    }

    fn builder(cfg: FeeSettings, estimator: Arc<dyn FeeEstimator>) -> (AttemptBuilder, Address) {
        let wallet = test_wallet();
        let from = wallet.address();
        let mut keystore = InMemoryKeystore::new();
        keystore.insert(wallet);
        (
            AttemptBuilder::new(CHAIN_ID, Arc::new(cfg), estimator, Arc::new(keystore)),
            from,
        )
    }

    fn intent(from: Address) -> PendingTx {
        let mut etx = PendingTx::new(
            from,
            Address::repeat_byte(0xaa),
            U256::zero(),
            Bytes::from(hex::decode("deadbeef").unwrap()),
            21_000,
        );
        etx.sequence = Some(5);
        etx
    }

    fn legacy_estimator(gas_price: u64) -> Arc<dyn FeeEstimator> {
        Arc::new(
            FixedPriceEstimator::new(Wei::from(gas_price), Wei::ZERO, Wei::ZERO, false)
                .with_bump_policy(20, Wei::ZERO),
        )
    }

    #[tokio::test]
    async fn test_fresh_legacy_attempt_end_to_end() {
        let (builder, from) = builder(settings(1, 1_000, 1, false), legacy_estimator(100));
        let etx = intent(from);

        let attempt = builder
            .new_attempt(&etx, QuoteOpts::default())
            .await
            .unwrap();

        assert_eq!(attempt.state, AttemptState::InProgress);
        assert_eq!(attempt.tx_type, TxType::Legacy);
        assert_eq!(attempt.fee, FeeQuote::legacy(Wei::from(100u64)));
        assert_eq!(attempt.gas_limit, 21_000);
        assert_eq!(attempt.tx_id, etx.id);
        assert!(!attempt.signed_raw_tx.is_empty());

        // Fixed key material means a reproducible content hash
        let again = builder
            .new_attempt(&etx, QuoteOpts::default())
            .await
            .unwrap();
        assert_eq!(attempt.hash, again.hash);
    }

    #[tokio::test]
    async fn test_fresh_attempt_ceiling_violation_is_fatal() {
        // An estimator that ignores the ceiling it was handed
        let mut estimator = MockFeeEstimator::new();
        estimator
            .expect_get_fee()
            .returning(|_, fee_limit, _, _| Ok((FeeQuote::legacy(Wei::from(100u64)), fee_limit)));

        let (builder, from) = builder(settings(1, 50, 1, false), Arc::new(estimator));
        let etx = intent(from);

        let err = builder
            .new_attempt(&etx, QuoteOpts::default())
            .await
            .unwrap_err();

        match err {
            TxError::GasPriceAboveCeiling { price, ceiling, key } => {
                assert_eq!(price, Wei::from(100u64));
                assert_eq!(ceiling, Wei::from(50u64));
                assert_eq!(key, from);
            }
            other => panic!("expected GasPriceAboveCeiling, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_validation_failure_is_not_retryable() {
        let (builder, from) = builder(settings(10, 1_000, 1, false), legacy_estimator(100));
        let etx = intent(from);

        let err = builder
            .new_custom_attempt(&etx, FeeQuote::legacy(Wei::from(5u64)), 21_000, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, TxError::GasPriceBelowFloor { .. }));
        assert!(!err.is_retryable());
        assert!(err.should_alert());
    }

    #[tokio::test]
    async fn test_config_selects_dynamic_type() {
        let estimator = Arc::new(FixedPriceEstimator::new(
            Wei::ZERO,
            Wei::from(30u64),
            Wei::from(2u64),
            true,
        ));
        let (builder, from) = builder(settings(1, 1_000, 1, true), estimator);
        let etx = intent(from);

        let attempt = builder
            .new_attempt(&etx, QuoteOpts::default())
            .await
            .unwrap();
        assert_eq!(attempt.tx_type, TxType::DynamicFee);
        assert_eq!(
            attempt.fee,
            FeeQuote::dynamic(Wei::from(30u64), Wei::from(2u64))
        );
    }

    #[tokio::test]
    async fn test_custom_attempt_type_quote_mismatch_is_fatal() {
        let (builder, from) = builder(settings(1, 1_000, 1, false), legacy_estimator(100));
        let etx = intent(from);

        // Dynamic type, legacy-only quote
        let err = builder
            .new_custom_attempt(&etx, FeeQuote::legacy(Wei::from(100u64)), 21_000, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, TxError::FeeMismatch { tx_type: 2, .. }));
        assert!(!err.is_retryable());
        assert!(err.should_alert());

        // Legacy type, dynamic-only quote
        let err = builder
            .new_custom_attempt(
                &etx,
                FeeQuote::dynamic(Wei::from(30u64), Wei::from(2u64)),
                21_000,
                0,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TxError::FeeMismatch { tx_type: 0, .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_custom_attempt_unknown_type_is_fatal() {
        let (builder, from) = builder(settings(1, 1_000, 1, false), legacy_estimator(100));
        let etx = intent(from);

        let err = builder
            .new_custom_attempt(&etx, FeeQuote::legacy(Wei::from(100u64)), 21_000, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, TxError::UnknownTxType { tx_type: 1, .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_estimator_failure_is_retryable() {
        let mut estimator = MockFeeEstimator::new();
        estimator
            .expect_get_fee()
            .returning(|_, _, _, _| Err(TxError::FeeEstimation("pricing service down".into())));

        let (builder, from) = builder(settings(1, 1_000, 1, false), Arc::new(estimator));
        let etx = intent(from);

        let err = builder
            .new_attempt(&etx, QuoteOpts::default())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_bump_attempt_uses_previous_type_and_raises_fee() {
        let (builder, from) = builder(settings(1, 1_000, 1, false), legacy_estimator(10));
        let etx = intent(from);

        let first = builder
            .new_custom_attempt(&etx, FeeQuote::legacy(Wei::from(10u64)), 21_000, 0)
            .await
            .unwrap();
        let second = builder
            .new_custom_attempt(&etx, FeeQuote::legacy(Wei::from(15u64)), 21_000, 0)
            .await
            .unwrap();

        let bumped = builder
            .new_bump_attempt(&etx, &second, &[first.clone(), second.clone()])
            .await
            .unwrap();

        assert_eq!(bumped.tx_type, TxType::Legacy);
        assert_eq!(bumped.fee, FeeQuote::legacy(Wei::from(18u64)));
        assert_ne!(bumped.hash, second.hash);
    }

    #[tokio::test]
    async fn test_bump_not_exceeding_priors_is_rejected_before_signing() {
        let (fixture, from) = builder(settings(1, 1_000, 1, false), legacy_estimator(10));
        let etx = intent(from);

        let first = fixture
            .new_custom_attempt(&etx, FeeQuote::legacy(Wei::from(10u64)), 21_000, 0)
            .await
            .unwrap();
        let second = fixture
            .new_custom_attempt(&etx, FeeQuote::legacy(Wei::from(15u64)), 21_000, 0)
            .await
            .unwrap();

        // A broken estimator hands back a fee below the highest prior
        let mut estimator = MockFeeEstimator::new();
        estimator
            .expect_bump_fee()
            .returning(|_, fee_limit, _, _| Ok((FeeQuote::legacy(Wei::from(14u64)), fee_limit)));
        let (builder, _) = builder(settings(1, 1_000, 1, false), Arc::new(estimator));

        let err = builder
            .new_bump_attempt(&etx, &second, &[first, second.clone()])
            .await
            .unwrap_err();

        match err {
            TxError::BumpBelowPrior { bumped, prior_max } => {
                assert_eq!(bumped, Wei::from(14u64));
                assert_eq!(prior_max, Wei::from(15u64));
            }
            other => panic!("expected BumpBelowPrior, got {other:?}"),
        }
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_bump_capped_at_ceiling_surfaces_distinct_error() {
        // Ceiling of 15 can never outbid the prior fee of 15
        let (builder, from) = builder(settings(1, 15, 1, false), legacy_estimator(10));
        let etx = intent(from);

        let attempt = builder
            .new_custom_attempt(&etx, FeeQuote::legacy(Wei::from(15u64)), 21_000, 0)
            .await
            .unwrap();

        let err = builder
            .new_bump_attempt(&etx, &attempt, &[attempt.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, TxError::BumpExceedsCeiling { .. }));
        assert!(!err.is_retryable());
        assert!(err.should_alert());
    }

    #[tokio::test]
    async fn test_signed_legacy_attempt_round_trips() {
        let (builder, from) = builder(settings(1, 1_000, 1, false), legacy_estimator(100));
        let etx = intent(from);

        let attempt = builder
            .new_attempt(&etx, QuoteOpts::default())
            .await
            .unwrap();

        let (decoded, _sig) =
            TypedTransaction::decode_signed(&Rlp::new(&attempt.signed_raw_tx)).unwrap();
        assert_eq!(
            decoded.to(),
            Some(&NameOrAddress::Address(Address::repeat_byte(0xaa)))
        );
        assert_eq!(decoded.value(), Some(&U256::zero()));
        assert_eq!(decoded.data(), Some(&etx.encoded_payload));
        assert_eq!(decoded.nonce(), Some(&U256::from(5u64)));
        assert_eq!(decoded.gas(), Some(&U256::from(21_000u64)));
        assert_eq!(decoded.gas_price(), Some(U256::from(100u64)));
    }

    #[tokio::test]
    async fn test_signed_dynamic_attempt_round_trips() {
        let estimator = Arc::new(FixedPriceEstimator::new(
            Wei::ZERO,
            Wei::from(30u64),
            Wei::from(2u64),
            true,
        ));
        let (builder, from) = builder(settings(1, 1_000, 1, true), estimator);
        let etx = intent(from);

        let attempt = builder
            .new_attempt(&etx, QuoteOpts::default())
            .await
            .unwrap();

        let (decoded, _sig) =
            TypedTransaction::decode_signed(&Rlp::new(&attempt.signed_raw_tx)).unwrap();
        match decoded {
            TypedTransaction::Eip1559(tx) => {
                assert_eq!(tx.max_fee_per_gas, Some(U256::from(30u64)));
                assert_eq!(tx.max_priority_fee_per_gas, Some(U256::from(2u64)));
                assert_eq!(tx.nonce, Some(U256::from(5u64)));
            }
            other => panic!("expected EIP-1559 envelope, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_attempt_requires_legacy_fee() {
        let (builder, from) = builder(settings(1, 1_000, 1, false), legacy_estimator(100));

        let attempt = builder
            .new_empty_attempt(7, 21_000, FeeQuote::legacy(Wei::from(100u64)), from)
            .await
            .unwrap();
        assert_eq!(attempt.tx_type, TxType::Legacy);
        assert_eq!(attempt.state, AttemptState::InProgress);
        assert!(!attempt.signed_raw_tx.is_empty());

        let err = builder
            .new_empty_attempt(
                7,
                21_000,
                FeeQuote::dynamic(Wei::from(30u64), Wei::from(2u64)),
                from,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TxError::FeeMismatch { .. }));
    }

    #[tokio::test]
    async fn test_unassigned_sequence_is_fatal() {
        let (builder, from) = builder(settings(1, 1_000, 1, false), legacy_estimator(100));
        let mut etx = intent(from);
        etx.sequence = None;

        let err = builder
            .new_custom_attempt(&etx, FeeQuote::legacy(Wei::from(100u64)), 21_000, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, TxError::SequenceUnassigned { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_unknown_signing_key_is_fatal() {
        let (builder, _) = builder(settings(1, 1_000, 1, false), legacy_estimator(100));
        // Intent from an address with no key material loaded
        let etx = intent(Address::repeat_byte(0x99));

        let err = builder
            .new_custom_attempt(&etx, FeeQuote::legacy(Wei::from(100u64)), 21_000, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, TxError::Signing { .. }));
        assert!(!err.is_retryable());
        assert!(err.should_alert());
    }
}
