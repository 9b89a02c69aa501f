use std::fmt;

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("invalid base58 encoding")]
    InvalidEncoding,
    #[error("invalid address length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// Base58-encoded 32-byte account address.
///
/// Wallet addresses are ed25519 public keys; program and mint addresses may
/// be off-curve, so parsing only validates the encoding and length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn from_public_key(key: &VerifyingKey) -> Self {
        Address(bs58::encode(key.as_bytes()).into_string())
    }

    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| AddressError::InvalidEncoding)?;
        let _: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressError::InvalidLength(bytes.len()))?;
        Ok(Address(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_bytes(&self) -> Result<[u8; 32], AddressError> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|_| AddressError::InvalidEncoding)?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressError::InvalidLength(bytes.len()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::WalletKeypair;

    #[test]
    fn round_trip_through_string() {
        let keypair = WalletKeypair::generate();
        let address = keypair.address();
        let parsed = Address::parse(address.as_str()).unwrap();
        assert_eq!(address, parsed);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Address::parse("not-base58-0OIl").is_err());
        assert!(Address::parse("abc").is_err());
    }
}
