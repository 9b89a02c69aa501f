use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{crypto::Address, time::TimestampMillis};

/// Lifecycle and transaction events fanned out to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SystemEvent {
    AgentCreated {
        agent_id: String,
        name: String,
        strategy: String,
        wallet_public_key: Address,
    },
    AgentStatusChanged {
        agent_id: String,
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        previous: Option<String>,
    },
    AgentAction {
        agent_id: String,
        action: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reasoning: Option<String>,
        #[serde(default, skip_serializing_if = "Value::is_null")]
        data: Value,
    },
    Transaction {
        #[serde(skip_serializing_if = "Option::is_none")]
        agent_id: Option<String>,
        transaction: Value,
    },
    BalanceChanged {
        wallet_id: String,
        public_key: Address,
        previous: u64,
        current: u64,
    },
    SystemError {
        component: String,
        message: String,
    },
}

impl SystemEvent {
    // Which agent an event belongs to, if any. Payloads may carry the agent
    // either as a flat `agentId` or nested under `agent.id`.
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            SystemEvent::AgentCreated { agent_id, .. }
            | SystemEvent::AgentStatusChanged { agent_id, .. }
            | SystemEvent::AgentAction { agent_id, .. } => Some(agent_id),
            SystemEvent::Transaction { agent_id, transaction } => agent_id
                .as_deref()
                .or_else(|| transaction.get("agentId").and_then(Value::as_str))
                .or_else(|| {
                    transaction
                        .get("agent")
                        .and_then(|a| a.get("id"))
                        .and_then(Value::as_str)
                }),
            SystemEvent::BalanceChanged { .. } | SystemEvent::SystemError { .. } => None,
        }
    }
}

/// A system event with its monotonically assigned id and emission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: u64,
    pub timestamp: TimestampMillis,
    #[serde(flatten)]
    pub event: SystemEvent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_json_shape() {
        let event = SystemEvent::AgentStatusChanged {
            agent_id: "agt_01".into(),
            status: "thinking".into(),
            previous: Some("idle".into()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "agent_status_changed");
        assert_eq!(json["agentId"], "agt_01");
    }

    #[test]
    fn agent_id_found_in_nested_payload() {
        let event = SystemEvent::Transaction {
            agent_id: None,
            transaction: json!({"agent": {"id": "agt_02"}}),
        };
        assert_eq!(event.agent_id(), Some("agt_02"));
    }
}
