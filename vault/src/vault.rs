// The vault is the only component holding secret key material. Secrets are
// generated here, encrypted at rest, and decrypted exclusively on the stack
// of `sign_transaction`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Local, Utc};
use log::{debug, info};
use serde::Serialize;
use tokio::task::JoinHandle;
use zeroize::Zeroizing;

use aegis_common::{
    config::MIN_KEY_ENCRYPTION_SECRET_LEN,
    crypto::{Address, WalletKeypair, SECRET_KEY_SIZE},
    intent::Intent,
    time::{get_current_time_in_millis, TimestampMillis},
    transaction::{SignedTransaction, UnsignedTransaction},
    utils::generate_id,
};

use crate::{
    cipher,
    error::VaultError,
    policy::{self, PolicyPatch, SpendingPolicy},
};

/// Public view of a wallet. The encrypted secret never leaves the vault.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletInfo {
    pub id: String,
    pub public_key: Address,
    pub label: String,
    pub created_at: TimestampMillis,
}

struct StoredWallet {
    info: WalletInfo,
    encrypted_secret: Vec<u8>,
    policy: SpendingPolicy,
    daily_transfers: u32,
}

pub struct WalletVault {
    passphrase: Zeroizing<Vec<u8>>,
    // wallet, policy and daily counter share one entry so policy checks,
    // increments and the midnight reset serialize on the same lock
    wallets: Mutex<HashMap<String, StoredWallet>>,
}

impl WalletVault {
    pub fn new(passphrase: &str) -> Result<Self, VaultError> {
        if passphrase.len() < MIN_KEY_ENCRYPTION_SECRET_LEN {
            return Err(VaultError::WeakPassphrase(MIN_KEY_ENCRYPTION_SECRET_LEN));
        }
        Ok(WalletVault {
            passphrase: Zeroizing::new(passphrase.as_bytes().to_vec()),
            wallets: Mutex::new(HashMap::new()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StoredWallet>> {
        self.wallets.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn create_wallet(&self, label: Option<String>) -> Result<WalletInfo, VaultError> {
        let keypair = WalletKeypair::generate();
        let seed = keypair.secret_seed();
        let encrypted_secret = cipher::seal(&self.passphrase, seed.as_ref())?;

        let id = generate_id("wal");
        let info = WalletInfo {
            id: id.clone(),
            public_key: keypair.address(),
            label: label.unwrap_or_else(|| format!("wallet-{}", id)),
            created_at: get_current_time_in_millis(),
        };

        let mut wallets = self.lock();
        wallets.insert(
            id,
            StoredWallet {
                info: info.clone(),
                encrypted_secret,
                policy: SpendingPolicy::default(),
                daily_transfers: 0,
            },
        );
        debug!("created wallet {} ({})", info.id, info.public_key);
        Ok(info)
    }

    pub fn get_wallet(&self, id: &str) -> Result<WalletInfo, VaultError> {
        self.lock()
            .get(id)
            .map(|w| w.info.clone())
            .ok_or_else(|| VaultError::WalletNotFound(id.to_owned()))
    }

    pub fn get_public_key(&self, id: &str) -> Result<Address, VaultError> {
        self.lock()
            .get(id)
            .map(|w| w.info.public_key.clone())
            .ok_or_else(|| VaultError::WalletNotFound(id.to_owned()))
    }

    pub fn list_wallets(&self) -> Vec<WalletInfo> {
        self.lock().values().map(|w| w.info.clone()).collect()
    }

    pub fn wallet_count(&self) -> usize {
        self.lock().len()
    }

    /// Sign a transaction with the wallet's key.
    ///
    /// This is the sole point where decryption occurs. The function is
    /// synchronous: the plaintext seed lives only on this call stack and is
    /// wiped before returning.
    pub fn sign_transaction(
        &self,
        id: &str,
        transaction: &UnsignedTransaction,
    ) -> Result<SignedTransaction, VaultError> {
        let encrypted = {
            let wallets = self.lock();
            let wallet = wallets
                .get(id)
                .ok_or_else(|| VaultError::WalletNotFound(id.to_owned()))?;
            wallet.encrypted_secret.clone()
        };

        let plain = cipher::open(&self.passphrase, &encrypted)?;
        let seed: [u8; SECRET_KEY_SIZE] = plain
            .as_slice()
            .try_into()
            .map_err(|_| VaultError::MalformedBlob)?;
        let seed = Zeroizing::new(seed);

        let keypair = WalletKeypair::from_seed(&seed);
        let bytes = transaction.signing_bytes()?;
        let signature = keypair.sign(&bytes);

        Ok(SignedTransaction {
            transaction: transaction.clone(),
            signature,
            signer: keypair.address(),
        })
    }

    // Policy gate. Reads policy and counter atomically, then evaluates the
    // pure policy function against the provided balance.
    pub fn validate_intent(
        &self,
        id: &str,
        intent: &Intent,
        current_balance: u64,
    ) -> Result<(), VaultError> {
        let (policy, daily) = {
            let wallets = self.lock();
            let wallet = wallets
                .get(id)
                .ok_or_else(|| VaultError::WalletNotFound(id.to_owned()))?;
            (wallet.policy.clone(), wallet.daily_transfers)
        };
        policy::evaluate(&policy, daily, intent, current_balance)?;
        Ok(())
    }

    // Count an executed transfer against the wallet's daily budget
    pub fn record_transfer(&self, id: &str) -> Result<u32, VaultError> {
        let mut wallets = self.lock();
        let wallet = wallets
            .get_mut(id)
            .ok_or_else(|| VaultError::WalletNotFound(id.to_owned()))?;
        wallet.daily_transfers = wallet.daily_transfers.saturating_add(1);
        Ok(wallet.daily_transfers)
    }

    pub fn daily_transfers(&self, id: &str) -> Result<u32, VaultError> {
        self.lock()
            .get(id)
            .map(|w| w.daily_transfers)
            .ok_or_else(|| VaultError::WalletNotFound(id.to_owned()))
    }

    pub fn get_policy(&self, id: &str) -> Result<SpendingPolicy, VaultError> {
        self.lock()
            .get(id)
            .map(|w| w.policy.clone())
            .ok_or_else(|| VaultError::WalletNotFound(id.to_owned()))
    }

    pub fn update_policy(
        &self,
        id: &str,
        patch: PolicyPatch,
    ) -> Result<SpendingPolicy, VaultError> {
        let mut wallets = self.lock();
        let wallet = wallets
            .get_mut(id)
            .ok_or_else(|| VaultError::WalletNotFound(id.to_owned()))?;
        wallet.policy.apply(patch);
        Ok(wallet.policy.clone())
    }

    pub fn delete_wallet(&self, id: &str) -> Result<(), VaultError> {
        self.lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| VaultError::WalletNotFound(id.to_owned()))
    }

    // Zero every wallet's daily transfer counter; returns how many were reset
    pub fn reset_daily_counters(&self) -> usize {
        let mut wallets = self.lock();
        for wallet in wallets.values_mut() {
            wallet.daily_transfers = 0;
        }
        wallets.len()
    }

    // Background task resetting counters at each local midnight of the host
    // process, then rescheduling itself
    pub fn spawn_daily_reset(self: &Arc<Self>) -> JoinHandle<()> {
        let vault = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let wait = aegis_common::time::duration_until_local_midnight();
                debug!("next wallet daily-counter reset in {:?}", wait);
                tokio::time::sleep(wait).await;
                let count = vault.reset_daily_counters();
                info!(
                    "reset daily transfer counters for {} wallets at local midnight (local {}, utc {})",
                    count,
                    Local::now().format("%Y-%m-%d %H:%M:%S %Z"),
                    Utc::now().format("%Y-%m-%d %H:%M:%S"),
                );
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyViolation;
    use aegis_common::crypto::WalletKeypair;
    use aegis_common::transaction::TransactionMessage;

    const PASSPHRASE: &str = "unit-test-passphrase";

    fn vault() -> WalletVault {
        WalletVault::new(PASSPHRASE).unwrap()
    }

    fn transfer_tx(fee_payer: Address) -> UnsignedTransaction {
        UnsignedTransaction::Legacy {
            message: TransactionMessage {
                fee_payer,
                recent_blockhash: "4vJ9JU1bJJE96FWSJKvHsmmFADCg4gpZQff4P3bkLKi".into(),
                instructions: vec![],
                memo: None,
            },
        }
    }

    #[test]
    fn weak_passphrase_is_rejected() {
        assert!(matches!(
            WalletVault::new("short"),
            Err(VaultError::WeakPassphrase(_))
        ));
    }

    #[test]
    fn create_and_sign() {
        let vault = vault();
        let info = vault.create_wallet(Some("primary".into())).unwrap();
        let tx = transfer_tx(info.public_key.clone());

        let signed = vault.sign_transaction(&info.id, &tx).unwrap();
        assert_eq!(signed.signer, info.public_key);

        // the signature verifies against the wallet's public key
        let key_bytes = info.public_key.to_bytes().unwrap();
        let key = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes).unwrap();
        assert!(WalletKeypair::verify(
            &key,
            &tx.signing_bytes().unwrap(),
            &signed.signature
        ));
    }

    #[test]
    fn deleted_wallet_is_gone_for_every_operation() {
        let vault = vault();
        let info = vault.create_wallet(None).unwrap();
        vault.delete_wallet(&info.id).unwrap();

        assert!(matches!(
            vault.get_wallet(&info.id),
            Err(VaultError::WalletNotFound(_))
        ));
        assert!(matches!(
            vault.get_public_key(&info.id),
            Err(VaultError::WalletNotFound(_))
        ));
        assert!(matches!(
            vault.sign_transaction(&info.id, &transfer_tx(info.public_key.clone())),
            Err(VaultError::WalletNotFound(_))
        ));
        assert!(matches!(
            vault.record_transfer(&info.id),
            Err(VaultError::WalletNotFound(_))
        ));
        assert!(matches!(
            vault.delete_wallet(&info.id),
            Err(VaultError::WalletNotFound(_))
        ));
    }

    #[test]
    fn daily_counter_lifecycle() {
        let vault = vault();
        let info = vault.create_wallet(None).unwrap();
        assert_eq!(vault.daily_transfers(&info.id).unwrap(), 0);
        assert_eq!(vault.record_transfer(&info.id).unwrap(), 1);
        assert_eq!(vault.record_transfer(&info.id).unwrap(), 2);
        assert_eq!(vault.reset_daily_counters(), 1);
        assert_eq!(vault.daily_transfers(&info.id).unwrap(), 0);
    }

    #[test]
    fn policy_gate_uses_the_stored_counter() {
        let vault = vault();
        let info = vault.create_wallet(None).unwrap();
        vault
            .update_policy(
                &info.id,
                PolicyPatch {
                    max_daily_transfers: Some(1),
                    ..Default::default()
                },
            )
            .unwrap();

        let intent = Intent::Airdrop { amount: 1 };
        assert!(vault.validate_intent(&info.id, &intent, 0).is_ok());
        vault.record_transfer(&info.id).unwrap();
        assert!(matches!(
            vault.validate_intent(&info.id, &intent, 0),
            Err(VaultError::Policy(PolicyViolation::DailyLimitExceeded(1)))
        ));
    }
}
