// Accumulator: keeps a wallet funded by requesting airdrops when the
// balance falls below a minimum, and occasionally tops up toward a target.

use rand::Rng;

use aegis_common::{
    intent::{ExternalIntentKind, Intent},
    utils::format_amount,
};

use super::{
    param_u32, param_units, registry::NormalizedParams, AgentContext, ParamField, Strategy,
    StrategyDecision, StrategyDefinition, StrategyError,
};

// Probability of a soft top-up when between minimum and target
const TOP_UP_PROBABILITY: f64 = 0.2;

pub struct Accumulator {
    target_balance: u64,
    min_balance: u64,
    airdrop_amount: u64,
    max_airdrops_per_day: u32,
    airdrops_today: u32,
}

impl Accumulator {
    pub fn definition() -> StrategyDefinition {
        StrategyDefinition {
            name: "accumulator".to_owned(),
            label: "Accumulator".to_owned(),
            description: "Requests airdrops whenever the balance drops below a minimum and \
                          softly tops up toward a target balance"
                .to_owned(),
            category: "funding".to_owned(),
            icon: "piggy-bank".to_owned(),
            supported_intents: vec![
                ExternalIntentKind::RequestAirdrop,
                ExternalIntentKind::QueryBalance,
            ],
            params: vec![
                ParamField::number("targetBalance", "Balance to accumulate toward", 0.0, 100.0, 2.0),
                ParamField::number("minBalance", "Request an airdrop below this balance", 0.0, 100.0, 0.5),
                ParamField::number("airdropAmount", "Amount requested per airdrop", 0.0, 5.0, 1.0),
                ParamField::number("maxAirdropsPerDay", "Daily airdrop budget", 1.0, 100.0, 5.0),
            ],
            default_params: [
                ("targetBalance".to_owned(), serde_json::json!(2.0)),
                ("minBalance".to_owned(), serde_json::json!(0.5)),
                ("airdropAmount".to_owned(), serde_json::json!(1.0)),
                ("maxAirdropsPerDay".to_owned(), serde_json::json!(5)),
            ]
            .into_iter()
            .collect(),
        }
    }

    pub fn new(params: &NormalizedParams) -> Result<Self, StrategyError> {
        let mut strategy = Accumulator {
            target_balance: 0,
            min_balance: 0,
            airdrop_amount: 0,
            max_airdrops_per_day: 0,
            airdrops_today: 0,
        };
        strategy.apply_params(params)?;
        Ok(strategy)
    }
}

impl Strategy for Accumulator {
    fn kind(&self) -> &'static str {
        "accumulator"
    }

    fn decide(&mut self, ctx: &AgentContext) -> StrategyDecision {
        if self.airdrops_today >= self.max_airdrops_per_day {
            return StrategyDecision::wait(format!(
                "Daily airdrop budget of {} exhausted",
                self.max_airdrops_per_day
            ));
        }

        if ctx.balance < self.min_balance {
            self.airdrops_today += 1;
            return StrategyDecision::act(
                Intent::Airdrop {
                    amount: self.airdrop_amount,
                },
                format!(
                    "Balance {} below minimum {}, requesting airdrop of {}",
                    format_amount(ctx.balance),
                    format_amount(self.min_balance),
                    format_amount(self.airdrop_amount)
                ),
            );
        }

        if ctx.balance < self.target_balance
            && rand::thread_rng().gen::<f64>() < TOP_UP_PROBABILITY
        {
            self.airdrops_today += 1;
            return StrategyDecision::act(
                Intent::Airdrop {
                    amount: self.airdrop_amount,
                },
                format!(
                    "Topping up toward target balance of {}",
                    format_amount(self.target_balance)
                ),
            );
        }

        StrategyDecision::wait(format!(
            "Balance {} is sufficient",
            format_amount(ctx.balance)
        ))
    }

    fn apply_params(&mut self, params: &NormalizedParams) -> Result<(), StrategyError> {
        self.target_balance = param_units(params, "targetBalance")?;
        self.min_balance = param_units(params, "minBalance")?;
        self.airdrop_amount = param_units(params, "airdropAmount")?;
        self.max_airdrops_per_day = param_u32(params, "maxAirdropsPerDay")?;
        Ok(())
    }

    fn daily_reset(&mut self) {
        self.airdrops_today = 0;
    }
}
