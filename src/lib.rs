//! txcore - transaction attempt construction and fee bumping for EVM broadcasters
//!
//! This crate is the outbound transaction pipeline's pricing core: it turns a
//! pending transaction intent plus a fee quote into a concrete, signed,
//! type-correct attempt, enforces operator-configured fee floors and
//! ceilings, and drives the fee replacement ("bump") protocol that produces
//! strictly increasing fees across retries.
//!
//! Persistence, confirmation watching, and chain submission are external
//! collaborators; this crate hands them an in-memory [`tx::TxAttempt`] and
//! nothing else. The two injected capabilities are the
//! [`fee::FeeEstimator`] (pricing) and the [`tx::AttemptSigner`] (key
//! material), both async and cancellable.
//!
//! Errors split into exactly two classes: retryable (transient estimator
//! trouble; recreate the attempt) and fatal (misconfiguration or an
//! estimator bug; halt that attempt and alert). See
//! [`error::TxError::is_retryable`].

pub mod config;
pub mod error;
pub mod fee;
pub mod price;
pub mod tx;

pub use config::{FeeConfig, FeeSettings};
pub use error::{TxError, TxResult};
pub use fee::{FeeEstimator, FeeQuote, FixedPriceEstimator, PriorAttempt, QuoteOpts};
pub use price::Wei;
pub use tx::{AttemptBuilder, AttemptSigner, AttemptState, InMemoryKeystore, PendingTx, TxAttempt, TxType};
