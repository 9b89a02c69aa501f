// Per-wallet spending policy and its evaluation.
//
// Evaluation is a pure function of (policy, daily counter, intent, balance):
// no I/O, deterministic, so it can be exercised exhaustively in tests.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use aegis_common::{
    config::{AUTONOMOUS_SAFETY_FLOOR, FEE_RESERVE, TOKEN_FEE_RESERVE, UNITS_PER_COIN},
    crypto::Address,
    intent::Intent,
    utils::from_ui_amount,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyViolation {
    #[error("daily transfer limit of {0} reached")]
    DailyLimitExceeded(u32),
    #[error("transfer of {amount} units exceeds the maximum of {max}")]
    MaxTransferExceeded { amount: u64, max: u64 },
    #[error("transfer would drop the balance below the minimum residual of {min_residual} units")]
    ResidualBalanceTooLow { min_residual: u64 },
    #[error("recipient {0} is not on the allow-list")]
    RecipientNotAllowed(Address),
    #[error("recipient {0} is deny-listed")]
    RecipientDenied(Address),
    #[error("transfer amount must be positive")]
    NonPositiveAmount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingPolicy {
    pub max_transfer_amount: u64,
    pub max_daily_transfers: u32,
    pub min_residual_balance: u64,
    // None means no allow-list is configured (all recipients pass)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_recipients: Option<HashSet<Address>>,
    #[serde(default, skip_serializing_if = "HashSet::is_empty")]
    pub denied_recipients: HashSet<Address>,
}

impl Default for SpendingPolicy {
    fn default() -> Self {
        SpendingPolicy {
            max_transfer_amount: UNITS_PER_COIN,
            max_daily_transfers: 10,
            min_residual_balance: UNITS_PER_COIN / 20,
            allowed_recipients: None,
            denied_recipients: HashSet::new(),
        }
    }
}

/// Partial policy update. `allowed_recipients: Some([])` removes the
/// allow-list entirely; an empty allow-list would block every recipient.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyPatch {
    pub max_transfer_amount: Option<u64>,
    pub max_daily_transfers: Option<u32>,
    pub min_residual_balance: Option<u64>,
    pub allowed_recipients: Option<Vec<Address>>,
    pub denied_recipients: Option<Vec<Address>>,
}

impl SpendingPolicy {
    pub fn apply(&mut self, patch: PolicyPatch) {
        if let Some(max) = patch.max_transfer_amount {
            self.max_transfer_amount = max;
        }
        if let Some(max) = patch.max_daily_transfers {
            self.max_daily_transfers = max;
        }
        if let Some(min) = patch.min_residual_balance {
            self.min_residual_balance = min;
        }
        if let Some(allowed) = patch.allowed_recipients {
            self.allowed_recipients = if allowed.is_empty() {
                None
            } else {
                Some(allowed.into_iter().collect())
            };
        }
        if let Some(denied) = patch.denied_recipients {
            self.denied_recipients = denied.into_iter().collect();
        }
    }

    fn check_recipient(&self, recipient: &Address) -> Result<(), PolicyViolation> {
        if let Some(allowed) = &self.allowed_recipients {
            if !allowed.contains(recipient) {
                return Err(PolicyViolation::RecipientNotAllowed(recipient.clone()));
            }
        }
        if self.denied_recipients.contains(recipient) {
            return Err(PolicyViolation::RecipientDenied(recipient.clone()));
        }
        Ok(())
    }
}

// Evaluate an intent against a wallet's policy, daily counter and balance.
pub fn evaluate(
    policy: &SpendingPolicy,
    daily_transfers: u32,
    intent: &Intent,
    balance: u64,
) -> Result<(), PolicyViolation> {
    if intent.is_autonomous() {
        return evaluate_autonomous(policy, daily_transfers, intent, balance);
    }

    // the daily counter gates every non-read intent
    if !intent.is_read_only() && daily_transfers >= policy.max_daily_transfers {
        return Err(PolicyViolation::DailyLimitExceeded(
            policy.max_daily_transfers,
        ));
    }

    match intent {
        Intent::TransferSol { recipient, amount } => {
            if *amount > policy.max_transfer_amount {
                return Err(PolicyViolation::MaxTransferExceeded {
                    amount: *amount,
                    max: policy.max_transfer_amount,
                });
            }
            let required = amount
                .checked_add(FEE_RESERVE)
                .and_then(|v| v.checked_add(policy.min_residual_balance));
            match required {
                Some(required) if balance >= required => {}
                _ => {
                    return Err(PolicyViolation::ResidualBalanceTooLow {
                        min_residual: policy.min_residual_balance,
                    })
                }
            }
            policy.check_recipient(recipient)
        }
        Intent::TransferToken {
            recipient, amount, ..
        } => {
            if *amount == 0 {
                return Err(PolicyViolation::NonPositiveAmount);
            }
            if balance < TOKEN_FEE_RESERVE + policy.min_residual_balance {
                return Err(PolicyViolation::ResidualBalanceTooLow {
                    min_residual: policy.min_residual_balance,
                });
            }
            policy.check_recipient(recipient)
        }
        // airdrops and balance reads carry no further restrictions
        Intent::Airdrop { .. } | Intent::QueryBalance => Ok(()),
        Intent::Autonomous { .. } => unreachable!("handled above"),
    }
}

// Relaxed rules for autonomous intents: doubled daily counter, doubled
// transfer cap, and a hard residual floor that the per-wallet policy can
// raise but never lower.
fn evaluate_autonomous(
    policy: &SpendingPolicy,
    daily_transfers: u32,
    intent: &Intent,
    balance: u64,
) -> Result<(), PolicyViolation> {
    let relaxed_daily = policy.max_daily_transfers.saturating_mul(2);
    if daily_transfers >= relaxed_daily {
        return Err(PolicyViolation::DailyLimitExceeded(relaxed_daily));
    }

    let floor = policy.min_residual_balance.max(AUTONOMOUS_SAFETY_FLOOR);

    let Intent::Autonomous { params, .. } = intent else {
        unreachable!("caller checked is_autonomous");
    };

    // when the action carries an explicit amount, bound it like a transfer
    let spend = params
        .get("amount")
        .and_then(|v| v.as_f64())
        .and_then(from_ui_amount);

    if let Some(spend) = spend {
        let relaxed_max = policy.max_transfer_amount.saturating_mul(2);
        if spend > relaxed_max {
            return Err(PolicyViolation::MaxTransferExceeded {
                amount: spend,
                max: relaxed_max,
            });
        }
        let required = spend
            .checked_add(FEE_RESERVE)
            .and_then(|v| v.checked_add(floor));
        match required {
            Some(required) if balance >= required => {}
            _ => return Err(PolicyViolation::ResidualBalanceTooLow { min_residual: floor }),
        }
    } else if balance < floor {
        // opaque instruction payloads still respect the hard floor
        return Err(PolicyViolation::ResidualBalanceTooLow { min_residual: floor });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_common::crypto::WalletKeypair;
    use serde_json::json;

    fn address() -> Address {
        WalletKeypair::generate().address()
    }

    fn policy() -> SpendingPolicy {
        SpendingPolicy {
            max_transfer_amount: UNITS_PER_COIN,
            max_daily_transfers: 2,
            min_residual_balance: UNITS_PER_COIN / 10,
            allowed_recipients: None,
            denied_recipients: HashSet::new(),
        }
    }

    #[test]
    fn daily_limit_applies_to_all_spending_intents() {
        let p = policy();
        let err = evaluate(&p, 2, &Intent::Airdrop { amount: 1 }, UNITS_PER_COIN);
        assert_eq!(err, Err(PolicyViolation::DailyLimitExceeded(2)));
        // reads are exempt
        assert!(evaluate(&p, 2, &Intent::QueryBalance, UNITS_PER_COIN).is_ok());
    }

    #[test]
    fn transfer_over_max_is_rejected() {
        let p = policy();
        let intent = Intent::TransferSol {
            recipient: address(),
            amount: UNITS_PER_COIN + 1,
        };
        assert!(matches!(
            evaluate(&p, 0, &intent, 10 * UNITS_PER_COIN),
            Err(PolicyViolation::MaxTransferExceeded { .. })
        ));
    }

    #[test]
    fn residual_balance_is_enforced() {
        let p = policy();
        let intent = Intent::TransferSol {
            recipient: address(),
            amount: UNITS_PER_COIN,
        };
        // 1 + fee + 0.1 residual needs more than 1.05
        assert!(matches!(
            evaluate(&p, 0, &intent, UNITS_PER_COIN + UNITS_PER_COIN / 20),
            Err(PolicyViolation::ResidualBalanceTooLow { .. })
        ));
        assert!(evaluate(&p, 0, &intent, 2 * UNITS_PER_COIN).is_ok());
    }

    #[test]
    fn allow_and_deny_lists() {
        let friend = address();
        let stranger = address();
        let mut p = policy();
        p.allowed_recipients = Some([friend.clone()].into_iter().collect());

        let to_stranger = Intent::TransferSol {
            recipient: stranger.clone(),
            amount: 1,
        };
        assert!(matches!(
            evaluate(&p, 0, &to_stranger, 2 * UNITS_PER_COIN),
            Err(PolicyViolation::RecipientNotAllowed(_))
        ));

        let mut p = policy();
        p.denied_recipients.insert(stranger.clone());
        assert!(matches!(
            evaluate(&p, 0, &to_stranger, 2 * UNITS_PER_COIN),
            Err(PolicyViolation::RecipientDenied(_))
        ));
    }

    #[test]
    fn zero_token_amount_is_rejected() {
        let p = policy();
        let intent = Intent::TransferToken {
            mint: address(),
            recipient: address(),
            amount: 0,
        };
        assert_eq!(
            evaluate(&p, 0, &intent, 2 * UNITS_PER_COIN),
            Err(PolicyViolation::NonPositiveAmount)
        );
    }

    #[test]
    fn autonomous_doubles_limits_but_keeps_floor() {
        let p = policy();
        let intent = Intent::Autonomous {
            action: "transfer_sol".into(),
            params: json!({"recipient": address().to_string(), "amount": 1.5}),
        };
        // 1.5 is over the 1.0 cap but under the doubled cap
        assert!(evaluate(&p, 0, &intent, 4 * UNITS_PER_COIN).is_ok());
        // daily counter doubled, not unlimited
        assert_eq!(
            evaluate(&p, 4, &intent, 4 * UNITS_PER_COIN),
            Err(PolicyViolation::DailyLimitExceeded(4))
        );
        // the hard floor still binds
        let broke = Intent::Autonomous {
            action: "execute_instructions".into(),
            params: json!({"instructions": []}),
        };
        assert!(matches!(
            evaluate(&p, 0, &broke, AUTONOMOUS_SAFETY_FLOOR / 2),
            Err(PolicyViolation::ResidualBalanceTooLow { .. })
        ));
    }
}
