// Authoritative record of externally-attached agents.
//
// The raw control token is returned exactly once at registration; only its
// SHA-256 digest is kept. Token authentication walks the whole index with
// constant-time digest comparisons and no early exit.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use log::info;
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

use aegis_common::{
    config::{MAX_AGENT_NAME_LEN, MIN_AGENT_NAME_LEN},
    crypto::{generate_control_token, hash_token, Address, TokenHash},
    intent::ExternalIntentKind,
    time::{get_current_time_in_millis, TimestampMillis},
    utils::generate_id,
};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("maximum number of external agents ({0}) reached")]
    Capacity(usize),
    #[error("an agent named '{0}' already exists")]
    NameTaken(String),
    #[error("agent name must be {MIN_AGENT_NAME_LEN}-{MAX_AGENT_NAME_LEN} characters")]
    InvalidName,
    #[error("remote agents must declare an endpoint")]
    EndpointRequired,
    #[error("at least one supported intent is required")]
    NoSupportedIntents,
    #[error("external agent '{0}' not found")]
    AgentNotFound(String),
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("agent has been revoked")]
    AgentRevoked,
    #[error("agent '{0}' already has a wallet bound")]
    WalletAlreadyBound(String),
    #[error("agent '{0}' has no wallet bound")]
    NoWalletBound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExternalAgentKind {
    Local,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExternalAgentStatus {
    Registered,
    Active,
    Inactive,
    Revoked,
}

#[derive(Debug, Clone)]
struct ExternalAgentRecord {
    name: String,
    kind: ExternalAgentKind,
    endpoint: Option<String>,
    supported_intents: HashSet<ExternalIntentKind>,
    status: ExternalAgentStatus,
    wallet_id: Option<String>,
    wallet_public_key: Option<Address>,
    control_token_hash: TokenHash,
    created_at: TimestampMillis,
    last_active_at: Option<TimestampMillis>,
}

/// Public view of an external agent; the token digest stays internal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAgentInfo {
    pub id: String,
    pub name: String,
    pub kind: ExternalAgentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub supported_intents: Vec<ExternalIntentKind>,
    pub status: ExternalAgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_public_key: Option<Address>,
    pub created_at: TimestampMillis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active_at: Option<TimestampMillis>,
}

impl ExternalAgentRecord {
    fn snapshot(&self, id: &str) -> ExternalAgentInfo {
        let mut supported: Vec<ExternalIntentKind> =
            self.supported_intents.iter().copied().collect();
        supported.sort_by_key(|kind| kind.to_string());
        ExternalAgentInfo {
            id: id.to_owned(),
            name: self.name.clone(),
            kind: self.kind,
            endpoint: self.endpoint.clone(),
            supported_intents: supported,
            status: self.status,
            wallet_id: self.wallet_id.clone(),
            wallet_public_key: self.wallet_public_key.clone(),
            created_at: self.created_at,
            last_active_at: self.last_active_at,
        }
    }
}

/// Registration request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: String,
    pub kind: ExternalAgentKind,
    #[serde(default)]
    pub endpoint: Option<String>,
    pub supported_intents: Vec<ExternalIntentKind>,
}

/// Returned once; the raw control token is never retrievable again.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationReceipt {
    pub agent_id: String,
    pub control_token: String,
}

struct RegistryState {
    agents: HashMap<String, ExternalAgentRecord>,
    token_index: HashMap<String, TokenHash>,
}

pub struct ExternalAgentRegistry {
    state: Mutex<RegistryState>,
    max_agents: usize,
}

impl ExternalAgentRegistry {
    pub fn new(max_agents: usize) -> Self {
        ExternalAgentRegistry {
            state: Mutex::new(RegistryState {
                agents: HashMap::new(),
                token_index: HashMap::new(),
            }),
            max_agents,
        }
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register(
        &self,
        registration: Registration,
    ) -> Result<RegistrationReceipt, RegistryError> {
        let name = registration.name.trim().to_owned();
        if name.len() < MIN_AGENT_NAME_LEN || name.len() > MAX_AGENT_NAME_LEN {
            return Err(RegistryError::InvalidName);
        }
        if registration.supported_intents.is_empty() {
            return Err(RegistryError::NoSupportedIntents);
        }
        if registration.kind == ExternalAgentKind::Remote
            && registration
                .endpoint
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .is_none()
        {
            return Err(RegistryError::EndpointRequired);
        }

        let mut state = self.state();
        let live = state
            .agents
            .values()
            .filter(|a| a.status != ExternalAgentStatus::Revoked)
            .count();
        if live >= self.max_agents {
            return Err(RegistryError::Capacity(self.max_agents));
        }
        if state
            .agents
            .values()
            .any(|a| a.status != ExternalAgentStatus::Revoked && a.name == name)
        {
            return Err(RegistryError::NameTaken(name));
        }

        let control_token = generate_control_token();
        let token_hash = hash_token(&control_token);
        let id = generate_id("ext");

        state.agents.insert(
            id.clone(),
            ExternalAgentRecord {
                name: name.clone(),
                kind: registration.kind,
                endpoint: registration.endpoint,
                supported_intents: registration.supported_intents.into_iter().collect(),
                status: ExternalAgentStatus::Registered,
                wallet_id: None,
                wallet_public_key: None,
                control_token_hash: token_hash.clone(),
                created_at: get_current_time_in_millis(),
                last_active_at: None,
            },
        );
        state.token_index.insert(id.clone(), token_hash);

        info!("registered external agent {} ({})", id, name);
        Ok(RegistrationReceipt {
            agent_id: id,
            control_token,
        })
    }

    /// Resolve a raw bearer token to its agent. The digest comparison walks
    /// every indexed token without short-circuiting.
    pub fn authenticate_token(
        &self,
        raw_token: &str,
    ) -> Result<ExternalAgentInfo, RegistryError> {
        let candidate = hash_token(raw_token);
        let mut state = self.state();

        let mut matched: Option<String> = None;
        for (agent_id, hash) in &state.token_index {
            if hash.ct_matches(&candidate) {
                matched = Some(agent_id.clone());
            }
        }

        let agent_id = matched.ok_or(RegistryError::AuthenticationFailed)?;
        let record = state
            .agents
            .get_mut(&agent_id)
            .ok_or(RegistryError::AuthenticationFailed)?;
        if record.status == ExternalAgentStatus::Revoked {
            return Err(RegistryError::AgentRevoked);
        }
        record.last_active_at = Some(get_current_time_in_millis());
        Ok(record.snapshot(&agent_id))
    }

    pub fn bind_wallet(
        &self,
        agent_id: &str,
        wallet_id: &str,
        public_key: Address,
    ) -> Result<ExternalAgentInfo, RegistryError> {
        let mut state = self.state();
        let record = state
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| RegistryError::AgentNotFound(agent_id.to_owned()))?;
        if record.status == ExternalAgentStatus::Revoked {
            return Err(RegistryError::AgentRevoked);
        }
        if record.wallet_id.is_some() {
            return Err(RegistryError::WalletAlreadyBound(agent_id.to_owned()));
        }
        record.wallet_id = Some(wallet_id.to_owned());
        record.wallet_public_key = Some(public_key);
        record.status = ExternalAgentStatus::Active;
        Ok(record.snapshot(agent_id))
    }

    pub fn activate(&self, agent_id: &str) -> Result<ExternalAgentInfo, RegistryError> {
        let mut state = self.state();
        let record = state
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| RegistryError::AgentNotFound(agent_id.to_owned()))?;
        if record.status == ExternalAgentStatus::Revoked {
            return Err(RegistryError::AgentRevoked);
        }
        if record.wallet_id.is_none() {
            return Err(RegistryError::NoWalletBound(agent_id.to_owned()));
        }
        record.status = ExternalAgentStatus::Active;
        Ok(record.snapshot(agent_id))
    }

    pub fn deactivate(&self, agent_id: &str) -> Result<ExternalAgentInfo, RegistryError> {
        let mut state = self.state();
        let record = state
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| RegistryError::AgentNotFound(agent_id.to_owned()))?;
        if record.status == ExternalAgentStatus::Revoked {
            return Err(RegistryError::AgentRevoked);
        }
        record.status = ExternalAgentStatus::Inactive;
        Ok(record.snapshot(agent_id))
    }

    // Terminal: the token is evicted from the reverse index and can never
    // authenticate again.
    pub fn revoke(&self, agent_id: &str) -> Result<ExternalAgentInfo, RegistryError> {
        let mut state = self.state();
        if !state.agents.contains_key(agent_id) {
            return Err(RegistryError::AgentNotFound(agent_id.to_owned()));
        }
        state.token_index.remove(agent_id);
        let record = state
            .agents
            .get_mut(agent_id)
            .expect("checked above");
        record.status = ExternalAgentStatus::Revoked;
        info!("revoked external agent {}", agent_id);
        Ok(record.snapshot(agent_id))
    }

    pub fn get_agent(&self, agent_id: &str) -> Result<ExternalAgentInfo, RegistryError> {
        self.state()
            .agents
            .get(agent_id)
            .map(|record| record.snapshot(agent_id))
            .ok_or_else(|| RegistryError::AgentNotFound(agent_id.to_owned()))
    }

    pub fn get_all(&self) -> Vec<ExternalAgentInfo> {
        self.state()
            .agents
            .iter()
            .map(|(id, record)| record.snapshot(id))
            .collect()
    }

    pub fn get_active(&self) -> Vec<ExternalAgentInfo> {
        self.state()
            .agents
            .iter()
            .filter(|(_, record)| record.status == ExternalAgentStatus::Active)
            .map(|(id, record)| record.snapshot(id))
            .collect()
    }

    pub fn agent_count(&self) -> usize {
        self.state().agents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_common::crypto::WalletKeypair;

    fn registration(name: &str) -> Registration {
        Registration {
            name: name.to_owned(),
            kind: ExternalAgentKind::Local,
            endpoint: None,
            supported_intents: vec![ExternalIntentKind::QueryBalance],
        }
    }

    #[test]
    fn register_then_authenticate() {
        let registry = ExternalAgentRegistry::new(4);
        let receipt = registry.register(registration("trader")).unwrap();
        let agent = registry.authenticate_token(&receipt.control_token).unwrap();
        assert_eq!(agent.id, receipt.agent_id);
        assert!(agent.last_active_at.is_some());

        assert!(matches!(
            registry.authenticate_token("not-a-token"),
            Err(RegistryError::AuthenticationFailed)
        ));
    }

    #[test]
    fn revoked_token_never_authenticates_again() {
        let registry = ExternalAgentRegistry::new(4);
        let receipt = registry.register(registration("trader")).unwrap();
        registry.revoke(&receipt.agent_id).unwrap();
        assert!(matches!(
            registry.authenticate_token(&receipt.control_token),
            Err(RegistryError::AuthenticationFailed)
        ));
        assert_eq!(
            registry.get_agent(&receipt.agent_id).unwrap().status,
            ExternalAgentStatus::Revoked
        );
    }

    #[test]
    fn name_uniqueness_ignores_revoked_agents() {
        let registry = ExternalAgentRegistry::new(4);
        let first = registry.register(registration("trader")).unwrap();
        assert!(matches!(
            registry.register(registration("trader")),
            Err(RegistryError::NameTaken(_))
        ));
        registry.revoke(&first.agent_id).unwrap();
        registry.register(registration("trader")).unwrap();
    }

    #[test]
    fn remote_agents_need_an_endpoint() {
        let registry = ExternalAgentRegistry::new(4);
        let err = registry
            .register(Registration {
                kind: ExternalAgentKind::Remote,
                ..registration("remote")
            })
            .unwrap_err();
        assert!(matches!(err, RegistryError::EndpointRequired));
    }

    #[test]
    fn wallet_binds_exactly_once() {
        let registry = ExternalAgentRegistry::new(4);
        let receipt = registry.register(registration("trader")).unwrap();
        let key = WalletKeypair::generate().address();

        let bound = registry
            .bind_wallet(&receipt.agent_id, "wal_1", key.clone())
            .unwrap();
        assert_eq!(bound.status, ExternalAgentStatus::Active);

        assert!(matches!(
            registry.bind_wallet(&receipt.agent_id, "wal_2", key),
            Err(RegistryError::WalletAlreadyBound(_))
        ));
    }

    #[test]
    fn activation_requires_a_bound_wallet() {
        let registry = ExternalAgentRegistry::new(4);
        let receipt = registry.register(registration("trader")).unwrap();
        assert!(matches!(
            registry.activate(&receipt.agent_id),
            Err(RegistryError::NoWalletBound(_))
        ));
    }

    #[test]
    fn capacity_counts_only_live_agents() {
        let registry = ExternalAgentRegistry::new(1);
        let first = registry.register(registration("one")).unwrap();
        assert!(matches!(
            registry.register(registration("two")),
            Err(RegistryError::Capacity(1))
        ));
        registry.revoke(&first.agent_id).unwrap();
        registry.register(registration("two")).unwrap();
    }
}
