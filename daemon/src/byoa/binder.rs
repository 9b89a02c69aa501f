// Bridges the external-agent registry and the wallet vault: creates a
// vault wallet for a registered agent and binds it, keeping a reverse
// index from wallet to agent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{info, warn};
use thiserror::Error;

use aegis_common::crypto::Address;
use aegis_vault::{VaultError, WalletVault};

use super::registry::{ExternalAgentRegistry, RegistryError};

#[derive(Debug, Error)]
pub enum BinderError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Vault(#[from] VaultError),
}

pub struct WalletBinder {
    vault: Arc<WalletVault>,
    registry: Arc<ExternalAgentRegistry>,
    // wallet id -> agent id
    index: Mutex<HashMap<String, String>>,
}

impl WalletBinder {
    pub fn new(vault: Arc<WalletVault>, registry: Arc<ExternalAgentRegistry>) -> Self {
        WalletBinder {
            vault,
            registry,
            index: Mutex::new(HashMap::new()),
        }
    }

    fn index(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.index.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create a vault wallet for an unbound agent and bind it. On registry
    /// failure the freshly created wallet is deleted again (best effort).
    pub fn bind_new_wallet(&self, agent_id: &str) -> Result<(String, Address), BinderError> {
        let agent = self.registry.get_agent(agent_id)?;
        if agent.wallet_id.is_some() {
            return Err(RegistryError::WalletAlreadyBound(agent_id.to_owned()).into());
        }

        let wallet = self
            .vault
            .create_wallet(Some(format!("byoa:{}", agent.name)))?;

        if let Err(bind_error) =
            self.registry
                .bind_wallet(agent_id, &wallet.id, wallet.public_key.clone())
        {
            if let Err(delete_error) = self.vault.delete_wallet(&wallet.id) {
                warn!(
                    "failed to roll back wallet {} after bind failure: {}",
                    wallet.id, delete_error
                );
            }
            return Err(bind_error.into());
        }

        self.index()
            .insert(wallet.id.clone(), agent_id.to_owned());
        info!(
            "bound wallet {} ({}) to external agent {}",
            wallet.id, wallet.public_key, agent_id
        );
        Ok((wallet.id, wallet.public_key))
    }

    pub fn agent_for_wallet(&self, wallet_id: &str) -> Option<String> {
        self.index().get(wallet_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byoa::registry::{ExternalAgentKind, Registration};
    use aegis_common::intent::ExternalIntentKind;

    fn setup() -> (WalletBinder, Arc<ExternalAgentRegistry>, Arc<WalletVault>, String) {
        let vault = Arc::new(WalletVault::new("binder-test-passphrase").unwrap());
        let registry = Arc::new(ExternalAgentRegistry::new(4));
        let receipt = registry
            .register(Registration {
                name: "ext".to_owned(),
                kind: ExternalAgentKind::Local,
                endpoint: None,
                supported_intents: vec![ExternalIntentKind::QueryBalance],
            })
            .unwrap();
        let binder = WalletBinder::new(Arc::clone(&vault), Arc::clone(&registry));
        (binder, registry, vault, receipt.agent_id)
    }

    #[test]
    fn binds_and_indexes_a_fresh_wallet() {
        let (binder, registry, vault, agent_id) = setup();
        let (wallet_id, public_key) = binder.bind_new_wallet(&agent_id).unwrap();

        assert_eq!(vault.get_public_key(&wallet_id).unwrap(), public_key);
        assert_eq!(binder.agent_for_wallet(&wallet_id), Some(agent_id.clone()));
        let agent = registry.get_agent(&agent_id).unwrap();
        assert_eq!(agent.wallet_id.as_deref(), Some(wallet_id.as_str()));
    }

    #[test]
    fn second_bind_fails_without_leaking_wallets() {
        let (binder, _registry, vault, agent_id) = setup();
        binder.bind_new_wallet(&agent_id).unwrap();
        assert_eq!(vault.wallet_count(), 1);

        let err = binder.bind_new_wallet(&agent_id).unwrap_err();
        assert!(matches!(
            err,
            BinderError::Registry(RegistryError::WalletAlreadyBound(_))
        ));
        assert_eq!(vault.wallet_count(), 1);
    }
}
