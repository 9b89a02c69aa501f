// Strategy catalog and the built-in decision functions.

mod accumulator;
mod balance_guard;
mod distributor;
mod registry;
mod scheduled_payer;

pub use accumulator::Accumulator;
pub use balance_guard::BalanceGuard;
pub use distributor::Distributor;
pub use registry::{
    NormalizedParams, ParamField, ParamKind, StrategyDefinition, StrategyRegistry,
};
pub use scheduled_payer::ScheduledPayer;

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use aegis_common::{
    crypto::{Address, Signature},
    intent::Intent,
};

use crate::chain::TokenBalance;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),
    #[error("missing required parameter '{0}'")]
    MissingParam(String),
    #[error("parameter '{key}': {reason}")]
    InvalidParam { key: String, reason: String },
}

impl StrategyError {
    pub fn invalid<K: Into<String>, R: Into<String>>(key: K, reason: R) -> Self {
        StrategyError::InvalidParam {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Chain state snapshot assembled by the scheduler before each decision.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub agent_id: String,
    pub public_key: Address,
    pub balance: u64,
    pub token_balances: Vec<TokenBalance>,
    pub recent_signatures: Vec<Signature>,
}

#[derive(Debug, Clone)]
pub struct StrategyDecision {
    pub should_act: bool,
    pub intent: Option<Intent>,
    pub reasoning: String,
}

impl StrategyDecision {
    pub fn act<R: Into<String>>(intent: Intent, reasoning: R) -> Self {
        StrategyDecision {
            should_act: true,
            intent: Some(intent),
            reasoning: reasoning.into(),
        }
    }

    pub fn wait<R: Into<String>>(reasoning: R) -> Self {
        StrategyDecision {
            should_act: false,
            intent: None,
            reasoning: reasoning.into(),
        }
    }
}

/// A decision function bound to one agent. Implementations keep their own
/// per-day counters; the scheduler invokes `daily_reset` at local midnight.
pub trait Strategy: Send {
    fn kind(&self) -> &'static str;

    fn decide(&mut self, ctx: &AgentContext) -> StrategyDecision;

    // Re-validate and adopt new parameters at runtime
    fn apply_params(&mut self, params: &NormalizedParams) -> Result<(), StrategyError>;

    fn daily_reset(&mut self);
}

// --- typed accessors over normalized parameter maps ---

pub(crate) fn param_f64(params: &IndexMap<String, Value>, key: &str) -> Result<f64, StrategyError> {
    params
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| StrategyError::MissingParam(key.to_owned()))
}

pub(crate) fn param_units(
    params: &IndexMap<String, Value>,
    key: &str,
) -> Result<u64, StrategyError> {
    let value = param_f64(params, key)?;
    aegis_common::utils::from_ui_amount(value)
        .ok_or_else(|| StrategyError::invalid(key, "must be a non-negative amount"))
}

pub(crate) fn param_u32(params: &IndexMap<String, Value>, key: &str) -> Result<u32, StrategyError> {
    let value = param_f64(params, key)?;
    if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(StrategyError::invalid(key, "must be a non-negative integer"));
    }
    Ok(value as u32)
}

pub(crate) fn param_string_list(
    params: &IndexMap<String, Value>,
    key: &str,
) -> Result<Vec<String>, StrategyError> {
    let list = params
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| StrategyError::MissingParam(key.to_owned()))?;
    list.iter()
        .map(|entry| {
            entry
                .as_str()
                .map(str::to_owned)
                .ok_or_else(|| StrategyError::invalid(key, "entries must be strings"))
        })
        .collect()
}

pub(crate) fn param_string(
    params: &IndexMap<String, Value>,
    key: &str,
) -> Result<String, StrategyError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| StrategyError::MissingParam(key.to_owned()))
}

pub(crate) fn param_addresses(
    params: &IndexMap<String, Value>,
    key: &str,
) -> Result<Vec<Address>, StrategyError> {
    param_string_list(params, key)?
        .into_iter()
        .map(|raw| {
            Address::parse(&raw)
                .map_err(|e| StrategyError::invalid(key, format!("'{}': {}", raw, e)))
        })
        .collect()
}
