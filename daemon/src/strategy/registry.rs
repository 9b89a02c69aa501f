// Process-global catalog of strategy kinds: metadata, parameter schemas
// and factories. Read-mostly after boot.

use std::sync::RwLock;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use aegis_common::intent::ExternalIntentKind;

use super::{
    Accumulator, BalanceGuard, Distributor, ScheduledPayer, Strategy, StrategyError,
};

pub type NormalizedParams = IndexMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamKind {
    Number,
    String,
    Boolean,
    StringList,
}

/// Typed descriptor for one strategy parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamField {
    pub key: String,
    pub kind: ParamKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub description: String,
}

impl ParamField {
    pub(crate) fn number(key: &str, description: &str, min: f64, max: f64, default: f64) -> Self {
        ParamField {
            key: key.to_owned(),
            kind: ParamKind::Number,
            min: Some(min),
            max: Some(max),
            required: false,
            default: Some(json!(default)),
            description: description.to_owned(),
        }
    }

    pub(crate) fn string_list(key: &str, description: &str) -> Self {
        ParamField {
            key: key.to_owned(),
            kind: ParamKind::StringList,
            min: None,
            max: None,
            required: true,
            default: None,
            description: description.to_owned(),
        }
    }

    pub(crate) fn string(key: &str, description: &str) -> Self {
        ParamField {
            key: key.to_owned(),
            kind: ParamKind::String,
            min: None,
            max: None,
            required: true,
            default: None,
            description: description.to_owned(),
        }
    }
}

/// JSON-serialisable definition of a strategy kind; field descriptors only,
/// no behavior.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyDefinition {
    pub name: String,
    pub label: String,
    pub description: String,
    pub category: String,
    pub icon: String,
    pub supported_intents: Vec<ExternalIntentKind>,
    pub params: Vec<ParamField>,
    pub default_params: NormalizedParams,
}

type StrategyFactory =
    Box<dyn Fn(&NormalizedParams) -> Result<Box<dyn Strategy>, StrategyError> + Send + Sync>;

struct RegisteredStrategy {
    definition: StrategyDefinition,
    factory: StrategyFactory,
}

pub struct StrategyRegistry {
    entries: RwLock<IndexMap<String, RegisteredStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        StrategyRegistry {
            entries: RwLock::new(IndexMap::new()),
        }
    }

    /// Registry pre-populated with the built-in strategy kinds.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(Accumulator::definition(), Box::new(|p| {
            Ok(Box::new(Accumulator::new(p)?) as Box<dyn Strategy>)
        }));
        registry.register(Distributor::definition(), Box::new(|p| {
            Ok(Box::new(Distributor::new(p)?) as Box<dyn Strategy>)
        }));
        registry.register(BalanceGuard::definition(), Box::new(|p| {
            Ok(Box::new(BalanceGuard::new(p)?) as Box<dyn Strategy>)
        }));
        registry.register(ScheduledPayer::definition(), Box::new(|p| {
            Ok(Box::new(ScheduledPayer::new(p)?) as Box<dyn Strategy>)
        }));
        registry
    }

    pub fn register(&self, definition: StrategyDefinition, factory: StrategyFactory) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            definition.name.clone(),
            RegisteredStrategy {
                definition,
                factory,
            },
        );
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<StrategyDefinition> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .map(|entry| entry.definition.clone())
    }

    pub fn list(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn to_dto(&self, name: &str) -> Option<StrategyDefinition> {
        self.get(name)
    }

    pub fn list_dtos(&self) -> Vec<StrategyDefinition> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(|entry| entry.definition.clone())
            .collect()
    }

    /// Coerce raw parameters against the schema: defaults are filled in,
    /// declared fields are type-checked and range-checked, and unknown
    /// fields are preserved untouched.
    pub fn validate_params(
        &self,
        name: &str,
        params: &Value,
    ) -> Result<NormalizedParams, StrategyError> {
        let definition = self
            .get(name)
            .ok_or_else(|| StrategyError::UnknownStrategy(name.to_owned()))?;

        let supplied = match params {
            Value::Null => serde_json::Map::new(),
            Value::Object(map) => map.clone(),
            _ => {
                return Err(StrategyError::invalid(
                    "strategyParams",
                    "must be an object",
                ))
            }
        };

        let mut normalized = definition.default_params.clone();

        for field in &definition.params {
            match supplied.get(&field.key) {
                Some(raw) => {
                    let coerced = coerce(field, raw)?;
                    normalized.insert(field.key.clone(), coerced);
                }
                None => {
                    if field.required && !normalized.contains_key(&field.key) {
                        return Err(StrategyError::MissingParam(field.key.clone()));
                    }
                }
            }
        }

        // unknown fields ride along untouched
        for (key, value) in supplied {
            if !definition.params.iter().any(|f| f.key == key) {
                normalized.insert(key, value);
            }
        }

        Ok(normalized)
    }

    pub fn build(
        &self,
        name: &str,
        params: &NormalizedParams,
    ) -> Result<Box<dyn Strategy>, StrategyError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let entry = entries
            .get(name)
            .ok_or_else(|| StrategyError::UnknownStrategy(name.to_owned()))?;
        (entry.factory)(params)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn coerce(field: &ParamField, raw: &Value) -> Result<Value, StrategyError> {
    match field.kind {
        ParamKind::Number => {
            // numeric strings are accepted, anything else is a type error
            let number = match raw {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse::<f64>().ok(),
                _ => None,
            }
            .ok_or_else(|| StrategyError::invalid(&field.key, "expected a number"))?;

            if let Some(min) = field.min {
                if number < min {
                    return Err(StrategyError::invalid(
                        &field.key,
                        format!("must be at least {}", min),
                    ));
                }
            }
            if let Some(max) = field.max {
                if number > max {
                    return Err(StrategyError::invalid(
                        &field.key,
                        format!("must be at most {}", max),
                    ));
                }
            }
            Ok(json!(number))
        }
        ParamKind::Boolean => match raw {
            Value::Bool(b) => Ok(json!(b)),
            Value::String(s) if s == "true" || s == "false" => Ok(json!(s == "true")),
            _ => Err(StrategyError::invalid(&field.key, "expected a boolean")),
        },
        ParamKind::String => match raw {
            Value::String(s) => Ok(json!(s)),
            _ => Err(StrategyError::invalid(&field.key, "expected a string")),
        },
        ParamKind::StringList => {
            let list = raw
                .as_array()
                .ok_or_else(|| StrategyError::invalid(&field.key, "expected a list of strings"))?;
            if list.iter().any(|entry| !entry.is_string()) {
                return Err(StrategyError::invalid(
                    &field.key,
                    "expected a list of strings",
                ));
            }
            Ok(raw.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_filled_in() {
        let registry = StrategyRegistry::with_builtins();
        let params = registry.validate_params("accumulator", &json!({})).unwrap();
        assert!(params.contains_key("targetBalance"));
        assert!(params.contains_key("airdropAmount"));
    }

    #[test]
    fn out_of_range_is_rejected() {
        let registry = StrategyRegistry::with_builtins();
        let err = registry
            .validate_params("accumulator", &json!({"airdropAmount": -1.0}))
            .unwrap_err();
        assert!(matches!(err, StrategyError::InvalidParam { .. }));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let registry = StrategyRegistry::with_builtins();
        let err = registry
            .validate_params("accumulator", &json!({"airdropAmount": {"nested": true}}))
            .unwrap_err();
        assert!(matches!(err, StrategyError::InvalidParam { .. }));
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let registry = StrategyRegistry::with_builtins();
        let params = registry
            .validate_params("accumulator", &json!({"airdropAmount": "1.5"}))
            .unwrap();
        assert_eq!(params["airdropAmount"], json!(1.5));
    }

    #[test]
    fn unknown_fields_are_preserved() {
        let registry = StrategyRegistry::with_builtins();
        let params = registry
            .validate_params("accumulator", &json!({"operatorNote": "rebalance"}))
            .unwrap();
        assert_eq!(params["operatorNote"], json!("rebalance"));
    }

    #[test]
    fn missing_required_param_is_rejected() {
        let registry = StrategyRegistry::with_builtins();
        let err = registry
            .validate_params("scheduled_payer", &json!({}))
            .unwrap_err();
        assert!(matches!(err, StrategyError::MissingParam(_)));
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let registry = StrategyRegistry::with_builtins();
        assert!(matches!(
            registry.validate_params("flashloan", &json!({})),
            Err(StrategyError::UnknownStrategy(_))
        ));
    }
}
