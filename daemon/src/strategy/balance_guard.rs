// BalanceGuard: requests an airdrop only when the balance crosses a
// critical threshold. Quieter than the accumulator; no opportunistic
// top-ups.

use aegis_common::{
    intent::{ExternalIntentKind, Intent},
    utils::format_amount,
};

use super::{
    param_u32, param_units, registry::NormalizedParams, AgentContext, ParamField, Strategy,
    StrategyDecision, StrategyDefinition, StrategyError,
};

pub struct BalanceGuard {
    critical_balance: u64,
    airdrop_amount: u64,
    max_airdrops_per_day: u32,
    airdrops_today: u32,
}

impl BalanceGuard {
    pub fn definition() -> StrategyDefinition {
        StrategyDefinition {
            name: "balance_guard".to_owned(),
            label: "Balance Guard".to_owned(),
            description: "Requests an airdrop only when the balance drops below a critical \
                          threshold"
                .to_owned(),
            category: "funding".to_owned(),
            icon: "shield".to_owned(),
            supported_intents: vec![
                ExternalIntentKind::RequestAirdrop,
                ExternalIntentKind::QueryBalance,
            ],
            params: vec![
                ParamField::number(
                    "criticalBalance",
                    "Airdrop when the balance falls below this",
                    0.0,
                    100.0,
                    0.1,
                ),
                ParamField::number("airdropAmount", "Amount requested per airdrop", 0.0, 5.0, 1.0),
                ParamField::number("maxAirdropsPerDay", "Daily airdrop budget", 1.0, 100.0, 3.0),
            ],
            default_params: [
                ("criticalBalance".to_owned(), serde_json::json!(0.1)),
                ("airdropAmount".to_owned(), serde_json::json!(1.0)),
                ("maxAirdropsPerDay".to_owned(), serde_json::json!(3)),
            ]
            .into_iter()
            .collect(),
        }
    }

    pub fn new(params: &NormalizedParams) -> Result<Self, StrategyError> {
        let mut strategy = BalanceGuard {
            critical_balance: 0,
            airdrop_amount: 0,
            max_airdrops_per_day: 0,
            airdrops_today: 0,
        };
        strategy.apply_params(params)?;
        Ok(strategy)
    }
}

impl Strategy for BalanceGuard {
    fn kind(&self) -> &'static str {
        "balance_guard"
    }

    fn decide(&mut self, ctx: &AgentContext) -> StrategyDecision {
        if ctx.balance >= self.critical_balance {
            return StrategyDecision::wait(format!(
                "Balance {} above the critical threshold",
                format_amount(ctx.balance)
            ));
        }
        if self.airdrops_today >= self.max_airdrops_per_day {
            return StrategyDecision::wait(format!(
                "Balance critical but daily airdrop budget of {} exhausted",
                self.max_airdrops_per_day
            ));
        }

        self.airdrops_today += 1;
        StrategyDecision::act(
            Intent::Airdrop {
                amount: self.airdrop_amount,
            },
            format!(
                "Balance {} below critical threshold {}, requesting airdrop",
                format_amount(ctx.balance),
                format_amount(self.critical_balance)
            ),
        )
    }

    fn apply_params(&mut self, params: &NormalizedParams) -> Result<(), StrategyError> {
        self.critical_balance = param_units(params, "criticalBalance")?;
        self.airdrop_amount = param_units(params, "airdropAmount")?;
        self.max_airdrops_per_day = param_u32(params, "maxAirdropsPerDay")?;
        Ok(())
    }

    fn daily_reset(&mut self) {
        self.airdrops_today = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StrategyRegistry;
    use aegis_common::config::UNITS_PER_COIN;
    use aegis_common::crypto::WalletKeypair;
    use serde_json::json;

    fn context(balance: u64) -> AgentContext {
        AgentContext {
            agent_id: "agt_test".into(),
            public_key: WalletKeypair::generate().address(),
            balance,
            token_balances: vec![],
            recent_signatures: vec![],
        }
    }

    #[test]
    fn only_acts_below_critical_threshold() {
        let registry = StrategyRegistry::with_builtins();
        let normalized = registry
            .validate_params("balance_guard", &json!({"criticalBalance": 0.1}))
            .unwrap();
        let mut strategy = BalanceGuard::new(&normalized).unwrap();

        assert!(!strategy.decide(&context(UNITS_PER_COIN)).should_act);
        let decision = strategy.decide(&context(UNITS_PER_COIN / 100));
        assert!(decision.should_act);
        assert!(matches!(decision.intent, Some(Intent::Airdrop { .. })));
    }
}
