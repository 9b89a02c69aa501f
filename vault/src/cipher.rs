// At-rest encryption for wallet secrets.
//
// Each wallet gets its own random salt; the AEAD key is derived from the
// vault-wide passphrase and that salt with Argon2id. The stored blob
// concatenates `salt ‖ nonce ‖ tag ‖ ciphertext`. Authentication failures
// are fatal for the affected wallet and are never retried.

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, KeyInit, Nonce};
use lazy_static::lazy_static;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::VaultError;

pub const SALT_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;
pub const KEY_SIZE: usize = 32;

const HEADER_SIZE: usize = SALT_SIZE + NONCE_SIZE + TAG_SIZE;

lazy_static! {
    // 16 MiB memory cost, 4 iterations
    pub static ref KEY_DERIVATION: Argon2<'static> = {
        let params = Params::new(16 * 1024, 4, 1, Some(KEY_SIZE)).unwrap();
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    };
}

// Derive the per-wallet AEAD key from the vault passphrase and wallet salt
fn derive_key(
    passphrase: &[u8],
    salt: &[u8; SALT_SIZE],
) -> Result<Zeroizing<[u8; KEY_SIZE]>, VaultError> {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    KEY_DERIVATION
        .hash_password_into(passphrase, salt, key.as_mut())
        .map_err(|_| VaultError::KeyDerivation)?;
    Ok(key)
}

// Encrypt a secret under the vault passphrase with a fresh salt and nonce
pub fn seal(passphrase: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);

    let key = derive_key(passphrase, &salt)?;
    let cipher =
        ChaCha20Poly1305::new_from_slice(key.as_ref()).map_err(|_| VaultError::Cipher)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from(nonce_bytes);
    let sealed = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| VaultError::Cipher)?;

    // the AEAD appends the tag to the ciphertext, store it ahead of it
    let split = sealed.len() - TAG_SIZE;
    let (ciphertext, tag) = sealed.split_at(split);

    let mut blob = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(tag);
    blob.extend_from_slice(ciphertext);
    Ok(blob)
}

// Decrypt a blob produced by `seal`. Fails closed on any tag mismatch.
pub fn open(passphrase: &[u8], blob: &[u8]) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    if blob.len() <= HEADER_SIZE {
        return Err(VaultError::MalformedBlob);
    }

    let salt: [u8; SALT_SIZE] = blob[..SALT_SIZE]
        .try_into()
        .map_err(|_| VaultError::MalformedBlob)?;
    let nonce = Nonce::try_from(&blob[SALT_SIZE..SALT_SIZE + NONCE_SIZE])
        .map_err(|_| VaultError::MalformedBlob)?;
    let tag = &blob[SALT_SIZE + NONCE_SIZE..HEADER_SIZE];
    let ciphertext = &blob[HEADER_SIZE..];

    let key = derive_key(passphrase, &salt)?;
    let cipher =
        ChaCha20Poly1305::new_from_slice(key.as_ref()).map_err(|_| VaultError::Cipher)?;

    let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_SIZE);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    let plaintext = cipher
        .decrypt(&nonce, sealed.as_slice())
        .map_err(|_| VaultError::Cipher)?;
    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let blob = seal(b"a-long-enough-passphrase", b"wallet secret").unwrap();
        let plain = open(b"a-long-enough-passphrase", &blob).unwrap();
        assert_eq!(plain.as_slice(), b"wallet secret");
    }

    #[test]
    fn wrong_passphrase_fails_closed() {
        let blob = seal(b"a-long-enough-passphrase", b"wallet secret").unwrap();
        assert!(matches!(
            open(b"another-passphrase-entirely", &blob),
            Err(VaultError::Cipher)
        ));
    }

    #[test]
    fn tampered_tag_fails_closed() {
        let mut blob = seal(b"a-long-enough-passphrase", b"wallet secret").unwrap();
        blob[SALT_SIZE + NONCE_SIZE] ^= 0x01;
        assert!(matches!(
            open(b"a-long-enough-passphrase", &blob),
            Err(VaultError::Cipher)
        ));
    }

    #[test]
    fn truncated_blob_is_rejected() {
        assert!(matches!(
            open(b"a-long-enough-passphrase", &[0u8; HEADER_SIZE]),
            Err(VaultError::MalformedBlob)
        ));
    }

    #[test]
    fn fresh_salt_per_seal() {
        let a = seal(b"a-long-enough-passphrase", b"secret").unwrap();
        let b = seal(b"a-long-enough-passphrase", b"secret").unwrap();
        assert_ne!(a[..SALT_SIZE], b[..SALT_SIZE]);
    }
}
