// ScheduledPayer: pays a single recipient a fixed amount, capped per day.

use aegis_common::{
    config::FEE_RESERVE,
    crypto::Address,
    intent::{ExternalIntentKind, Intent},
    utils::format_amount,
};

use super::{
    param_string, param_u32, param_units, registry::NormalizedParams, AgentContext, ParamField,
    Strategy, StrategyDecision, StrategyDefinition, StrategyError,
};

pub struct ScheduledPayer {
    recipient: Address,
    amount: u64,
    max_payments_per_day: u32,
    payments_today: u32,
}

impl ScheduledPayer {
    pub fn definition() -> StrategyDefinition {
        StrategyDefinition {
            name: "scheduled_payer".to_owned(),
            label: "Scheduled Payer".to_owned(),
            description: "Pays a fixed amount to a single recipient, a bounded number of times \
                          per day"
                .to_owned(),
            category: "payments".to_owned(),
            icon: "calendar".to_owned(),
            supported_intents: vec![
                ExternalIntentKind::TransferSol,
                ExternalIntentKind::QueryBalance,
            ],
            params: vec![
                ParamField::string("recipient", "Recipient address"),
                ParamField::number("paymentAmount", "Amount sent per payment", 0.000000001, 10.0, 0.1),
                ParamField::number("maxPaymentsPerDay", "Payments allowed per day", 1.0, 48.0, 1.0),
            ],
            default_params: [
                ("paymentAmount".to_owned(), serde_json::json!(0.1)),
                ("maxPaymentsPerDay".to_owned(), serde_json::json!(1)),
            ]
            .into_iter()
            .collect(),
        }
    }

    pub fn new(params: &NormalizedParams) -> Result<Self, StrategyError> {
        let mut strategy = ScheduledPayer {
            recipient: Address::parse("11111111111111111111111111111111")
                .expect("placeholder address is valid"),
            amount: 0,
            max_payments_per_day: 0,
            payments_today: 0,
        };
        strategy.apply_params(params)?;
        Ok(strategy)
    }
}

impl Strategy for ScheduledPayer {
    fn kind(&self) -> &'static str {
        "scheduled_payer"
    }

    fn decide(&mut self, ctx: &AgentContext) -> StrategyDecision {
        if self.payments_today >= self.max_payments_per_day {
            return StrategyDecision::wait(format!(
                "All {} payments for today are done",
                self.max_payments_per_day
            ));
        }
        if self.recipient == ctx.public_key {
            return StrategyDecision::wait("Skipping self as recipient");
        }
        if ctx.balance < self.amount.saturating_add(FEE_RESERVE) {
            return StrategyDecision::wait(format!(
                "Balance {} cannot cover a payment of {}",
                format_amount(ctx.balance),
                format_amount(self.amount)
            ));
        }

        self.payments_today += 1;
        StrategyDecision::act(
            Intent::TransferSol {
                recipient: self.recipient.clone(),
                amount: self.amount,
            },
            format!(
                "Scheduled payment {} of {} to {}",
                self.payments_today, self.max_payments_per_day, self.recipient
            ),
        )
    }

    fn apply_params(&mut self, params: &NormalizedParams) -> Result<(), StrategyError> {
        let raw = param_string(params, "recipient")?;
        self.recipient = Address::parse(&raw)
            .map_err(|e| StrategyError::invalid("recipient", e.to_string()))?;
        self.amount = param_units(params, "paymentAmount")?;
        self.max_payments_per_day = param_u32(params, "maxPaymentsPerDay")?;
        Ok(())
    }

    fn daily_reset(&mut self) {
        self.payments_today = 0;
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
    fn pays_up_to_the_daily_cap() {
        let recipient = WalletKeypair::generate().address();
        let registry = StrategyRegistry::with_builtins();
        let normalized = registry
            .validate_params(
                "scheduled_payer",
                &json!({"recipient": recipient.to_string(), "maxPaymentsPerDay": 2}),
            )
            .unwrap();
        let mut strategy = ScheduledPayer::new(&normalized).unwrap();

        assert!(strategy.decide(&context(UNITS_PER_COIN)).should_act);
        assert!(strategy.decide(&context(UNITS_PER_COIN)).should_act);
        let third = strategy.decide(&context(UNITS_PER_COIN));
        assert!(!third.should_act);
        assert!(third.reasoning.contains("done"));
    }

    #[test]
    fn waits_on_insufficient_balance() {
        let recipient = WalletKeypair::generate().address();
        let registry = StrategyRegistry::with_builtins();
        let normalized = registry
            .validate_params(
                "scheduled_payer",
                &json!({"recipient": recipient.to_string(), "paymentAmount": 1.0}),
            )
            .unwrap();
        let mut strategy = ScheduledPayer::new(&normalized).unwrap();
        assert!(!strategy.decide(&context(1_000)).should_act);
    }
}
