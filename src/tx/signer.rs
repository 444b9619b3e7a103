//! Signing adapter
//!
//! Thin wrapper over an external signing capability keyed by source address.
//! Produces the canonical signed envelope and its content hash; the signing
//! algorithm itself lives behind [`AttemptSigner`].

use crate::error::{TxError, TxResult};

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Signature, H256};
use ethers::utils::keccak256;
use std::collections::HashMap;

/// Capability that signs a type-correct unsigned transaction for a source
/// address.
///
/// Failures (unknown key, backend unavailable) are fatal for the attempt;
/// escalation policy belongs to the caller.
#[async_trait]
pub trait AttemptSigner: Send + Sync {
    async fn sign_tx(
        &self,
        from: Address,
        tx: &TypedTransaction,
        chain_id: u64,
    ) -> TxResult<Signature>;
}

/// Sign `tx` and produce the canonical (content hash, signed envelope) pair
pub async fn sign_and_encode(
    signer: &dyn AttemptSigner,
    from: Address,
    tx: &TypedTransaction,
    chain_id: u64,
) -> TxResult<(H256, Bytes)> {
    let signature = signer.sign_tx(from, tx, chain_id).await?;
    let raw = tx.rlp_signed(&signature);
    let hash = H256::from(keccak256(&raw));
    Ok((hash, raw))
}

/// In-memory keystore backed by local wallets, one per source address
#[derive(Default)]
pub struct InMemoryKeystore {
    wallets: HashMap<Address, LocalWallet>,
}

impl InMemoryKeystore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wallet under its own address
    pub fn insert(&mut self, wallet: LocalWallet) {
        self.wallets.insert(wallet.address(), wallet);
    }

    pub fn contains(&self, address: Address) -> bool {
        self.wallets.contains_key(&address)
    }
}

#[async_trait]
impl AttemptSigner for InMemoryKeystore {
    async fn sign_tx(
        &self,
        from: Address,
        tx: &TypedTransaction,
        chain_id: u64,
    ) -> TxResult<Signature> {
        let wallet = self.wallets.get(&from).ok_or_else(|| TxError::Signing {
            address: from,
            message: "no key material for account".to_string(),
        })?;

        wallet
            .clone()
            .with_chain_id(chain_id)
            .sign_transaction(tx)
            .await
            .map_err(|e| TxError::Signing {
                address: from,
                message: e.to_string(),
            })
    }
}
