use std::fmt;

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::Address;

pub const SECRET_KEY_SIZE: usize = 32;

/// Detached ed25519 signature, displayed in base58 like chain explorers expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    pub fn from_bytes(bytes: &[u8; 64]) -> Self {
        Signature(bs58::encode(bytes).into_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Signature {
    fn from(value: String) -> Self {
        Signature(value)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// In-memory ed25519 keypair.
///
/// Outside of tests this type only ever lives on the stack of the vault's
/// signing path: the vault stores encrypted seeds, not keypairs.
pub struct WalletKeypair {
    signing: SigningKey,
}

impl WalletKeypair {
    pub fn generate() -> Self {
        let seed: [u8; SECRET_KEY_SIZE] = rand::random();
        Self::from_seed(&seed)
    }

    pub fn from_seed(seed: &[u8; SECRET_KEY_SIZE]) -> Self {
        WalletKeypair {
            signing: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    pub fn address(&self) -> Address {
        Address::from_public_key(&self.public_key())
    }

    // Seed bytes wrapped so they are wiped when the caller drops them
    pub fn secret_seed(&self) -> Zeroizing<[u8; SECRET_KEY_SIZE]> {
        Zeroizing::new(self.signing.to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig = self.signing.sign(message);
        Signature::from_bytes(&sig.to_bytes())
    }

    pub fn verify(key: &VerifyingKey, message: &[u8], signature: &Signature) -> bool {
        let Ok(bytes) = bs58::decode(signature.as_str()).into_vec() else {
            return false;
        };
        let Ok(array) = <[u8; 64]>::try_from(bytes.as_slice()) else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(&array);
        key.verify(message, &sig).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let keypair = WalletKeypair::generate();
        let sig = keypair.sign(b"payload");
        assert!(WalletKeypair::verify(&keypair.public_key(), b"payload", &sig));
        assert!(!WalletKeypair::verify(&keypair.public_key(), b"other", &sig));
    }

    #[test]
    fn seed_round_trip() {
        let keypair = WalletKeypair::generate();
        let seed = keypair.secret_seed();
        let restored = WalletKeypair::from_seed(&seed);
        assert_eq!(keypair.address(), restored.address());
    }
}
