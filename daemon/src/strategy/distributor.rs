// Distributor: cycles through a recipient list, sending a fixed amount per
// cycle behind a probability gate. The wallet's own address is skipped.

use rand::Rng;

use aegis_common::{
    config::FEE_RESERVE,
    crypto::Address,
    intent::{ExternalIntentKind, Intent},
    utils::format_amount,
};

use super::{
    param_addresses, param_u32, param_units, registry::NormalizedParams, AgentContext,
    ParamField, Strategy, StrategyDecision, StrategyDefinition, StrategyError,
};

pub struct Distributor {
    recipients: Vec<Address>,
    amount: u64,
    probability: f64,
    max_transfers_per_day: u32,
    min_balance: u64,
    cursor: usize,
    transfers_today: u32,
}

impl Distributor {
    pub fn definition() -> StrategyDefinition {
        StrategyDefinition {
            name: "distributor".to_owned(),
            label: "Distributor".to_owned(),
            description: "Cycles a recipient list, sending a fixed amount per cycle with a \
                          configurable probability"
                .to_owned(),
            category: "payments".to_owned(),
            icon: "share".to_owned(),
            supported_intents: vec![
                ExternalIntentKind::TransferSol,
                ExternalIntentKind::QueryBalance,
            ],
            params: vec![
                ParamField::string_list("recipients", "Recipient addresses visited in order"),
                ParamField::number(
                    "distributionAmount",
                    "Amount sent per executed cycle",
                    0.000000001,
                    10.0,
                    0.1,
                ),
                ParamField::number(
                    "distributionProbability",
                    "Probability that an eligible cycle actually sends",
                    0.0,
                    1.0,
                    0.5,
                ),
                ParamField::number("maxTransfersPerDay", "Daily transfer budget", 1.0, 100.0, 10.0),
                ParamField::number(
                    "minBalance",
                    "Keep at least this balance before sending",
                    0.0,
                    100.0,
                    0.1,
                ),
            ],
            default_params: [
                ("distributionAmount".to_owned(), serde_json::json!(0.1)),
                ("distributionProbability".to_owned(), serde_json::json!(0.5)),
                ("maxTransfersPerDay".to_owned(), serde_json::json!(10)),
                ("minBalance".to_owned(), serde_json::json!(0.1)),
            ]
            .into_iter()
            .collect(),
        }
    }

    pub fn new(params: &NormalizedParams) -> Result<Self, StrategyError> {
        let mut strategy = Distributor {
            recipients: vec![],
            amount: 0,
            probability: 0.0,
            max_transfers_per_day: 0,
            min_balance: 0,
            cursor: 0,
            transfers_today: 0,
        };
        strategy.apply_params(params)?;
        Ok(strategy)
    }

    fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % self.recipients.len().max(1);
    }
}

impl Strategy for Distributor {
    fn kind(&self) -> &'static str {
        "distributor"
    }

    fn decide(&mut self, ctx: &AgentContext) -> StrategyDecision {
        if self.recipients.is_empty() {
            return StrategyDecision::wait("No recipients configured");
        }
        if self.transfers_today >= self.max_transfers_per_day {
            return StrategyDecision::wait(format!(
                "Daily transfer budget of {} exhausted",
                self.max_transfers_per_day
            ));
        }

        let recipient = self.recipients[self.cursor % self.recipients.len()].clone();
        if recipient == ctx.public_key {
            self.advance();
            return StrategyDecision::wait("Skipping self as recipient");
        }

        if rand::thread_rng().gen::<f64>() >= self.probability {
            return StrategyDecision::wait("Probability gate held this cycle");
        }

        let required = self
            .amount
            .saturating_add(FEE_RESERVE)
            .saturating_add(self.min_balance);
        if ctx.balance < required {
            return StrategyDecision::wait(format!(
                "Balance {} too low to distribute {}",
                format_amount(ctx.balance),
                format_amount(self.amount)
            ));
        }

        self.advance();
        self.transfers_today += 1;
        StrategyDecision::act(
            Intent::TransferSol {
                recipient: recipient.clone(),
                amount: self.amount,
            },
            format!(
                "Distributing {} to {}",
                format_amount(self.amount),
                recipient
            ),
        )
    }

    fn apply_params(&mut self, params: &NormalizedParams) -> Result<(), StrategyError> {
        let recipients = param_addresses(params, "recipients")?;
        if recipients.is_empty() {
            return Err(StrategyError::invalid("recipients", "must not be empty"));
        }
        self.recipients = recipients;
        self.amount = param_units(params, "distributionAmount")?;
        self.probability = super::param_f64(params, "distributionProbability")?;
        self.max_transfers_per_day = param_u32(params, "maxTransfersPerDay")?;
        self.min_balance = param_units(params, "minBalance")?;
        self.cursor = self.cursor.min(self.recipients.len().saturating_sub(1));
        Ok(())
    }

    fn daily_reset(&mut self) {
        self.transfers_today = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StrategyRegistry;
    use aegis_common::config::UNITS_PER_COIN;
    use aegis_common::crypto::WalletKeypair;
    use serde_json::json;

    fn context(public_key: Address, balance: u64) -> AgentContext {
        AgentContext {
            agent_id: "agt_test".into(),
            public_key,
            balance,
            token_balances: vec![],
            recent_signatures: vec![],
        }
    }

    fn distributor(recipients: Vec<String>) -> Distributor {
        let registry = StrategyRegistry::with_builtins();
        let normalized = registry
            .validate_params(
                "distributor",
                &json!({
                    "recipients": recipients,
                    "distributionProbability": 1.0,
                    "distributionAmount": 0.1,
                }),
            )
            .unwrap();
        Distributor::new(&normalized).unwrap()
    }

    #[test]
    fn skips_self_and_advances() {
        let own = WalletKeypair::generate().address();
        let other = WalletKeypair::generate().address();
        let mut strategy =
            distributor(vec![own.to_string(), other.to_string()]);

        let first = strategy.decide(&context(own.clone(), 10 * UNITS_PER_COIN));
        assert!(!first.should_act);
        assert_eq!(first.reasoning, "Skipping self as recipient");

        let second = strategy.decide(&context(own, 10 * UNITS_PER_COIN));
        assert!(second.should_act);
        assert!(matches!(
            second.intent,
            Some(Intent::TransferSol { recipient, .. }) if recipient == other
        ));
    }

    #[test]
    fn respects_daily_budget() {
        let own = WalletKeypair::generate().address();
        let other = WalletKeypair::generate().address();
        let registry = StrategyRegistry::with_builtins();
        let normalized = registry
            .validate_params(
                "distributor",
                &json!({
                    "recipients": [other.to_string()],
                    "distributionProbability": 1.0,
                    "maxTransfersPerDay": 1,
                }),
            )
            .unwrap();
        let mut strategy = Distributor::new(&normalized).unwrap();

        assert!(strategy.decide(&context(own.clone(), 10 * UNITS_PER_COIN)).should_act);
        assert!(!strategy.decide(&context(own.clone(), 10 * UNITS_PER_COIN)).should_act);
        strategy.daily_reset();
        assert!(strategy.decide(&context(own, 10 * UNITS_PER_COIN)).should_act);
    }

    #[test]
    fn waits_when_balance_is_too_low() {
        let own = WalletKeypair::generate().address();
        let other = WalletKeypair::generate().address();
        let mut strategy = distributor(vec![other.to_string()]);
        let decision = strategy.decide(&context(own, 1_000));
        assert!(!decision.should_act);
        assert!(decision.reasoning.contains("too low"));
    }

    #[test]
    fn empty_recipient_list_is_rejected() {
        let registry = StrategyRegistry::with_builtins();
        let normalized = registry
            .validate_params("distributor", &json!({"recipients": []}))
            .unwrap();
        assert!(Distributor::new(&normalized).is_err());
    }
}
