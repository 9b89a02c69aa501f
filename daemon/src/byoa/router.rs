// Gateway between external HTTP intents and the execution substrate.
//
// A rejection (rate limit, unsupported intent, policy, chain failure) is a
// deterministic `rejected` result returned to the caller, never a transport
// error. Only authentication-class failures surface as errors.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, warn};
use serde_json::{json, Value};
use thiserror::Error;

use aegis_common::{
    config::{DEFAULT_RATE_LIMIT_PER_MINUTE, RATE_LIMIT_WINDOW_SECS},
    event::SystemEvent,
    intent::{
        ExternalIntentKind, ExternalIntentRequest, Intent, IntentEnvelope, IntentHistoryRecord,
        IntentResult, IntentStatus,
    },
    time::get_current_time_in_millis,
    utils::{from_ui_amount, generate_id},
};
use aegis_vault::WalletVault;

use crate::{
    chain::ChainClient,
    events::EventBus,
    history::IntentHistory,
    orchestrator::Executor,
};

use super::registry::{
    ExternalAgentInfo, ExternalAgentRegistry, ExternalAgentStatus, RegistryError,
};

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("authentication failed")]
    Auth,
    #[error("agent has been revoked")]
    Revoked,
    #[error("agent is not active")]
    Inactive,
    #[error("token does not control agent '{0}'")]
    TargetMismatch(String),
}

impl From<RegistryError> for RouterError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::AgentRevoked => RouterError::Revoked,
            _ => RouterError::Auth,
        }
    }
}

/// Per-agent sliding-window rate limiter.
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    entries: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        RateLimiter {
            window,
            max_requests,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    // Timestamps older than the window are evicted on every check.
    pub fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let bucket = entries.entry(key.to_owned()).or_default();
        while let Some(front) = bucket.front() {
            if now.duration_since(*front) > self.window {
                bucket.pop_front();
            } else {
                break;
            }
        }
        if bucket.len() >= self.max_requests as usize {
            return false;
        }
        bucket.push_back(now);
        true
    }

    pub fn remove(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(RATE_LIMIT_WINDOW_SECS),
            DEFAULT_RATE_LIMIT_PER_MINUTE,
        )
    }
}

pub struct IntentRouter {
    registry: Arc<ExternalAgentRegistry>,
    chain: Arc<dyn ChainClient>,
    events: Arc<EventBus>,
    history: Arc<IntentHistory>,
    executor: Executor,
    rate_limiter: RateLimiter,
}

impl IntentRouter {
    pub fn new(
        registry: Arc<ExternalAgentRegistry>,
        vault: Arc<WalletVault>,
        chain: Arc<dyn ChainClient>,
        events: Arc<EventBus>,
        history: Arc<IntentHistory>,
        executor_ledger: Arc<crate::orchestrator::TransactionLedger>,
        rate_limiter: RateLimiter,
    ) -> Self {
        let executor = Executor::new(
            vault,
            Arc::clone(&chain),
            Arc::clone(&events),
            executor_ledger,
            Arc::clone(&history),
        );
        IntentRouter {
            registry,
            chain,
            events,
            history,
            executor,
            rate_limiter,
        }
    }

    /// Authenticate a bearer token; used both by `submit_intent` and by the
    /// HTTP layer to verify a token's target against a path parameter.
    pub fn authenticate(&self, raw_token: &str) -> Result<ExternalAgentInfo, RouterError> {
        Ok(self.registry.authenticate_token(raw_token)?)
    }

    pub async fn submit_intent(
        &self,
        raw_token: &str,
        request: ExternalIntentRequest,
    ) -> Result<IntentResult, RouterError> {
        let agent = self.authenticate(raw_token)?;

        if agent.status != ExternalAgentStatus::Active {
            return Err(RouterError::Inactive);
        }

        let intent_id = generate_id("int");

        let (Some(wallet_id), Some(public_key)) =
            (agent.wallet_id.clone(), agent.wallet_public_key.clone())
        else {
            return Ok(self.reject(&agent, &intent_id, &request, "No wallet bound to agent"));
        };

        if !self.rate_limiter.check(&agent.id) {
            debug!("rate limit hit for external agent {}", agent.id);
            return Ok(self.reject(
                &agent,
                &intent_id,
                &request,
                &format!(
                    "Rate limit exceeded: at most {} intents per minute",
                    self.rate_limiter.max_requests()
                ),
            ));
        }

        if !agent.supported_intents.contains(&request.kind) {
            return Ok(self.reject(
                &agent,
                &intent_id,
                &request,
                &format!("Intent type {} is not supported by this agent", request.kind),
            ));
        }

        let intent = match translate(&request) {
            Ok(intent) => intent,
            Err(message) => return Ok(self.reject(&agent, &intent_id, &request, &message)),
        };

        let balance = match self.chain.get_balance(&public_key).await {
            Ok(balance) => balance.raw_units,
            Err(error) => {
                warn!("balance lookup failed for {}: {}", agent.id, error);
                return Ok(self.reject(&agent, &intent_id, &request, &error.to_string()));
            }
        };

        let envelope = IntentEnvelope {
            id: intent_id.clone(),
            agent_id: agent.id.clone(),
            timestamp: get_current_time_in_millis(),
            intent,
        };

        // the executor records the executed/rejected history entry
        let outcome = self
            .executor
            .execute(&envelope, &wallet_id, &public_key, balance)
            .await;

        let result = match outcome {
            Ok(result) => {
                self.events.emit(SystemEvent::AgentAction {
                    agent_id: agent.id.clone(),
                    action: format!("byoa_intent:{}", request.kind),
                    reasoning: None,
                    data: json!({ "intentId": intent_id }),
                });
                IntentResult {
                    intent_id,
                    status: IntentStatus::Executed,
                    kind: request.kind,
                    agent_id: agent.id.clone(),
                    wallet_public_key: Some(public_key),
                    result: Some(result),
                    error: None,
                    executed_at: get_current_time_in_millis(),
                }
            }
            Err(error) => IntentResult {
                intent_id,
                status: IntentStatus::Rejected,
                kind: request.kind,
                agent_id: agent.id.clone(),
                wallet_public_key: Some(public_key),
                result: None,
                error: Some(error.to_string()),
                executed_at: get_current_time_in_millis(),
            },
        };
        Ok(result)
    }

    // Build a rejected result for failures ahead of execution and append
    // the matching history entry (the executor never saw these).
    fn reject(
        &self,
        agent: &ExternalAgentInfo,
        intent_id: &str,
        request: &ExternalIntentRequest,
        message: &str,
    ) -> IntentResult {
        self.history.push(IntentHistoryRecord {
            intent_id: intent_id.to_owned(),
            agent_id: agent.id.clone(),
            kind: request.kind,
            params: request.params.clone(),
            status: IntentStatus::Rejected,
            result: None,
            error: Some(message.to_owned()),
            created_at: get_current_time_in_millis(),
        });
        IntentResult {
            intent_id: intent_id.to_owned(),
            status: IntentStatus::Rejected,
            kind: request.kind,
            agent_id: agent.id.clone(),
            wallet_public_key: agent.wallet_public_key.clone(),
            result: None,
            error: Some(message.to_owned()),
            executed_at: get_current_time_in_millis(),
        }
    }
}

// Translate the wire request into an internal intent. Amounts arrive as
// decimals and are converted to atomic units here.
fn translate(request: &ExternalIntentRequest) -> Result<Intent, String> {
    let params = &request.params;
    match request.kind {
        ExternalIntentKind::RequestAirdrop => {
            let amount = decimal_amount(params, "amount")?;
            Ok(Intent::Airdrop { amount })
        }
        ExternalIntentKind::TransferSol => {
            let recipient = address_field(params, "recipient")?;
            let amount = decimal_amount(params, "amount")?;
            Ok(Intent::TransferSol { recipient, amount })
        }
        ExternalIntentKind::TransferToken => {
            let mint = address_field(params, "mint")?;
            let recipient = address_field(params, "recipient")?;
            let amount = params
                .get("amount")
                .and_then(Value::as_u64)
                .ok_or_else(|| "amount must be raw token units".to_owned())?;
            Ok(Intent::TransferToken {
                mint,
                recipient,
                amount,
            })
        }
        ExternalIntentKind::QueryBalance => Ok(Intent::QueryBalance),
        ExternalIntentKind::Autonomous => {
            let action = params
                .get("action")
                .and_then(Value::as_str)
                .ok_or_else(|| "autonomous intents require an action".to_owned())?
                .to_owned();
            let inner = params.get("params").cloned().unwrap_or(params.clone());
            Ok(Intent::Autonomous {
                action,
                params: inner,
            })
        }
    }
}

fn decimal_amount(params: &Value, key: &str) -> Result<u64, String> {
    params
        .get(key)
        .and_then(Value::as_f64)
        .and_then(from_ui_amount)
        .ok_or_else(|| format!("{} must be a non-negative decimal amount", key))
}

fn address_field(params: &Value, key: &str) -> Result<aegis_common::crypto::Address, String> {
    let raw = params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("{} must be an address string", key))?;
    aegis_common::crypto::Address::parse(raw).map_err(|e| format!("{} '{}': {}", key, raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sliding_window_evicts_old_entries() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);
        let start = Instant::now();
        assert!(limiter.check_at("agent", start));
        assert!(limiter.check_at("agent", start + Duration::from_secs(1)));
        // third inside the window is rejected
        assert!(!limiter.check_at("agent", start + Duration::from_secs(2)));
        // after the window slides past the first two, capacity frees up
        assert!(limiter.check_at("agent", start + Duration::from_secs(62)));
    }

    #[test]
    fn limits_are_per_key() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);
        let now = Instant::now();
        assert!(limiter.check_at("a", now));
        assert!(limiter.check_at("b", now));
        assert!(!limiter.check_at("a", now));
    }

    #[test]
    fn translate_converts_decimal_amounts() {
        let request = ExternalIntentRequest {
            kind: ExternalIntentKind::RequestAirdrop,
            params: json!({"amount": 1.5}),
        };
        let intent = translate(&request).unwrap();
        assert!(matches!(intent, Intent::Airdrop { amount } if amount == 1_500_000_000));
    }

    #[test]
    fn translate_rejects_bad_addresses() {
        let request = ExternalIntentRequest {
            kind: ExternalIntentKind::TransferSol,
            params: json!({"recipient": "nope", "amount": 0.1}),
        };
        assert!(translate(&request).is_err());
    }
}
