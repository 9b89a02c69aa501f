// Built-in agent model.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::Display;

use aegis_common::{
    config::{MAX_CYCLE_INTERVAL_MS, MIN_CYCLE_INTERVAL_MS},
    crypto::Address,
    time::TimestampMillis,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Thinking,
    Executing,
    Waiting,
    Error,
    Stopped,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSettings {
    pub cycle_interval_ms: u64,
    pub max_actions_per_day: u32,
    pub enabled: bool,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        ExecutionSettings {
            cycle_interval_ms: 30_000,
            max_actions_per_day: 100,
            enabled: true,
        }
    }
}

impl ExecutionSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.cycle_interval_ms < MIN_CYCLE_INTERVAL_MS {
            return Err(format!(
                "cycleIntervalMs must be at least {}",
                MIN_CYCLE_INTERVAL_MS
            ));
        }
        if self.cycle_interval_ms > MAX_CYCLE_INTERVAL_MS {
            return Err(format!(
                "cycleIntervalMs must be at most {}",
                MAX_CYCLE_INTERVAL_MS
            ));
        }
        if self.max_actions_per_day == 0 {
            return Err("maxActionsPerDay must be at least 1".to_owned());
        }
        Ok(())
    }

    pub fn apply(&mut self, patch: &ExecutionSettingsPatch) {
        if let Some(interval) = patch.cycle_interval_ms {
            self.cycle_interval_ms = interval;
        }
        if let Some(max) = patch.max_actions_per_day {
            self.max_actions_per_day = max;
        }
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSettingsPatch {
    pub cycle_interval_ms: Option<u64>,
    pub max_actions_per_day: Option<u32>,
    pub enabled: Option<bool>,
}

/// Request shape for creating a built-in agent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentConfig {
    pub name: String,
    #[serde(rename = "strategy")]
    pub strategy_kind: String,
    #[serde(default)]
    pub strategy_params: Value,
    #[serde(default)]
    pub execution_settings: Option<ExecutionSettingsPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfigPatch {
    pub strategy_params: Option<Value>,
    pub execution_settings: Option<ExecutionSettingsPatch>,
}

/// Serializable snapshot of a managed agent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "strategy")]
    pub strategy_kind: String,
    pub wallet_id: String,
    pub wallet_public_key: Address,
    pub status: AgentStatus,
    pub strategy_params: Value,
    pub execution_settings: ExecutionSettings,
    pub created_at: TimestampMillis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_action_at: Option<TimestampMillis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}
