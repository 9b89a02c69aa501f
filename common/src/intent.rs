use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::{crypto::Address, time::TimestampMillis};

/// Declarative description of the action an agent wishes to perform.
/// Amounts are atomic units; the HTTP boundary converts from decimals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Intent {
    Airdrop {
        amount: u64,
    },
    TransferSol {
        recipient: Address,
        amount: u64,
    },
    TransferToken {
        mint: Address,
        recipient: Address,
        amount: u64,
    },
    QueryBalance,
    Autonomous {
        action: String,
        #[serde(default)]
        params: Value,
    },
}

impl Intent {
    // Canonical kind shared by built-in and external activity feeds
    pub fn kind(&self) -> ExternalIntentKind {
        match self {
            Intent::Airdrop { .. } => ExternalIntentKind::RequestAirdrop,
            Intent::TransferSol { .. } => ExternalIntentKind::TransferSol,
            Intent::TransferToken { .. } => ExternalIntentKind::TransferToken,
            Intent::QueryBalance => ExternalIntentKind::QueryBalance,
            Intent::Autonomous { .. } => ExternalIntentKind::Autonomous,
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, Intent::QueryBalance)
    }

    pub fn is_autonomous(&self) -> bool {
        matches!(self, Intent::Autonomous { .. })
    }
}

/// An intent together with its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentEnvelope {
    pub id: String,
    pub agent_id: String,
    pub timestamp: TimestampMillis,
    #[serde(flatten)]
    pub intent: Intent,
}

/// Closed set of intent kinds an external agent may declare support for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ExternalIntentKind {
    RequestAirdrop,
    TransferSol,
    TransferToken,
    QueryBalance,
    Autonomous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IntentStatus {
    Executed,
    Rejected,
}

/// Unified record across built-in and external agents, kept in a bounded
/// ring buffer so both populations share one feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentHistoryRecord {
    pub intent_id: String,
    pub agent_id: String,
    #[serde(rename = "type")]
    pub kind: ExternalIntentKind,
    pub params: Value,
    pub status: IntentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: TimestampMillis,
}

/// Wire shape of an externally submitted intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalIntentRequest {
    #[serde(rename = "type")]
    pub kind: ExternalIntentKind,
    #[serde(default)]
    pub params: Value,
}

/// Deterministic result shape returned for every submitted intent.
/// A policy or quota rejection is still a successful response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResult {
    pub intent_id: String,
    pub status: IntentStatus,
    #[serde(rename = "type")]
    pub kind: ExternalIntentKind,
    pub agent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_public_key: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub executed_at: TimestampMillis,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_serializes_with_type_tag() {
        let intent = Intent::Airdrop { amount: 1_000_000_000 };
        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["type"], "airdrop");
        assert_eq!(json["amount"], 1_000_000_000u64);
    }

    #[test]
    fn kind_mapping_is_fixed() {
        assert_eq!(
            Intent::Airdrop { amount: 1 }.kind().to_string(),
            "REQUEST_AIRDROP"
        );
        assert_eq!(Intent::QueryBalance.kind().to_string(), "QUERY_BALANCE");
        assert_eq!(
            "TRANSFER_SOL".parse::<ExternalIntentKind>().unwrap(),
            ExternalIntentKind::TransferSol
        );
    }
}
