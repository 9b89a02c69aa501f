use thiserror::Error;

use crate::policy::PolicyViolation;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("wallet '{0}' not found")]
    WalletNotFound(String),
    // AEAD or KDF failures are fatal for the affected wallet and never retried
    #[error("cipher failure")]
    Cipher,
    #[error("key derivation failure")]
    KeyDerivation,
    #[error("encrypted secret blob is malformed")]
    MalformedBlob,
    #[error("nonce generation failure")]
    NonceGeneration,
    #[error("vault passphrase must be at least {0} characters")]
    WeakPassphrase(usize),
    #[error(transparent)]
    Policy(#[from] PolicyViolation),
    #[error("transaction error: {0}")]
    Transaction(#[from] aegis_common::transaction::TransactionError),
}
