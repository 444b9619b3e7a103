//! Transaction attempt construction, validation and signing

pub mod builder;
pub mod signer;
pub mod types;
pub mod validation;

pub use builder::AttemptBuilder;
pub use signer::{AttemptSigner, InMemoryKeystore};
pub use types::{AttemptState, PendingTx, TxAttempt, TxType};
