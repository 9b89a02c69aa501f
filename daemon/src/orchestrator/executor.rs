// Intent execution pipeline.
//
// Built-in agents (through the scheduler) and external agents (through the
// intent router) both funnel into this executor, so both populations share
// one transaction ledger, one event stream and one intent-history feed.
//
// The policy gate always runs before a transaction record is created or any
// chain call is made, so a rejected intent leaves no trace beyond its
// `rejected` history entry.

use std::sync::Arc;

use log::{debug, warn};
use serde_json::{json, Value};
use thiserror::Error;

use aegis_common::{
    crypto::Address,
    intent::{Intent, IntentEnvelope, IntentHistoryRecord, IntentStatus},
    event::SystemEvent,
    time::get_current_time_in_millis,
    transaction::{Instruction, SignedTransaction, UnsignedTransaction},
    utils::from_ui_amount,
};
use aegis_vault::{PolicyViolation, VaultError, WalletVault};

use crate::{
    chain::{Balance, ChainClient, ChainError, SendOutcome},
    events::EventBus,
    history::IntentHistory,
};

use super::ledger::{TransactionLedger, TransactionRecord, TransactionStatus};

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("policy violation: {0}")]
    Policy(#[from] PolicyViolation),
    #[error(transparent)]
    Vault(VaultError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("unsupported autonomous action '{0}'")]
    UnsupportedAction(String),
    #[error("invalid intent parameters: {0}")]
    InvalidParams(String),
}

impl From<VaultError> for ExecutionError {
    fn from(error: VaultError) -> Self {
        match error {
            VaultError::Policy(violation) => ExecutionError::Policy(violation),
            other => ExecutionError::Vault(other),
        }
    }
}

impl ExecutionError {
    pub fn is_policy(&self) -> bool {
        matches!(self, ExecutionError::Policy(_))
    }
}

pub struct Executor {
    vault: Arc<WalletVault>,
    chain: Arc<dyn ChainClient>,
    events: Arc<EventBus>,
    ledger: Arc<TransactionLedger>,
    history: Arc<IntentHistory>,
}

impl Executor {
    pub fn new(
        vault: Arc<WalletVault>,
        chain: Arc<dyn ChainClient>,
        events: Arc<EventBus>,
        ledger: Arc<TransactionLedger>,
        history: Arc<IntentHistory>,
    ) -> Self {
        Executor {
            vault,
            chain,
            events,
            ledger,
            history,
        }
    }

    pub fn ledger(&self) -> &Arc<TransactionLedger> {
        &self.ledger
    }

    /// Execute an intent against a wallet and record the outcome in the
    /// shared intent history. `balance` is the caller's current view of the
    /// wallet balance; the policy gate runs against it before anything else.
    pub async fn execute(
        &self,
        envelope: &IntentEnvelope,
        wallet_id: &str,
        public_key: &Address,
        balance: u64,
    ) -> Result<Value, ExecutionError> {
        let result = self
            .dispatch(envelope, wallet_id, public_key, balance)
            .await;

        let record = IntentHistoryRecord {
            intent_id: envelope.id.clone(),
            agent_id: envelope.agent_id.clone(),
            kind: envelope.intent.kind(),
            params: serde_json::to_value(&envelope.intent).unwrap_or(Value::Null),
            status: if result.is_ok() {
                IntentStatus::Executed
            } else {
                IntentStatus::Rejected
            },
            result: result.as_ref().ok().cloned(),
            error: result.as_ref().err().map(|e| e.to_string()),
            created_at: get_current_time_in_millis(),
        };
        self.history.push(record);

        result
    }

    async fn dispatch(
        &self,
        envelope: &IntentEnvelope,
        wallet_id: &str,
        public_key: &Address,
        balance: u64,
    ) -> Result<Value, ExecutionError> {
        // policy first: a rejected intent must not touch the ledger or chain
        self.vault
            .validate_intent(wallet_id, &envelope.intent, balance)?;

        match &envelope.intent {
            Intent::Airdrop { amount } => {
                self.run_airdrop(envelope, wallet_id, public_key, *amount, "airdrop")
                    .await
            }
            Intent::TransferSol { recipient, amount } => {
                self.run_native_transfer(
                    envelope,
                    wallet_id,
                    public_key,
                    recipient,
                    *amount,
                    None,
                    "transfer_sol",
                    true,
                )
                .await
            }
            Intent::TransferToken {
                mint,
                recipient,
                amount,
            } => {
                self.run_token_transfer(
                    envelope, wallet_id, public_key, mint, recipient, *amount, None,
                )
                .await
            }
            Intent::QueryBalance => Ok(json!({
                "balance": Balance::from_units(balance),
                "publicKey": public_key,
            })),
            Intent::Autonomous { action, params } => {
                self.run_autonomous(envelope, wallet_id, public_key, balance, action, params)
                    .await
            }
        }
    }

    // --- concrete execution paths ---

    async fn run_airdrop(
        &self,
        envelope: &IntentEnvelope,
        wallet_id: &str,
        public_key: &Address,
        amount: u64,
        kind: &str,
    ) -> Result<Value, ExecutionError> {
        let record = self.insert_pending(envelope, wallet_id, kind, |r| TransactionRecord {
            amount: Some(amount),
            to: Some(public_key.clone()),
            ..r
        });

        match self.chain.request_airdrop(public_key, amount).await {
            Ok(receipt) => {
                self.finish_confirmed(&record.id, &envelope.agent_id, |r| TransactionRecord {
                    signature: Some(receipt.signature.clone()),
                    ..r.clone()
                });
                Ok(json!({
                    "signature": receipt.signature,
                    "slot": receipt.slot,
                    "amount": amount,
                }))
            }
            Err(error) => {
                self.finish_failed(&record.id, &envelope.agent_id, &error);
                Err(error.into())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_native_transfer(
        &self,
        envelope: &IntentEnvelope,
        wallet_id: &str,
        public_key: &Address,
        recipient: &Address,
        amount: u64,
        memo: Option<String>,
        kind: &str,
        count_transfer: bool,
    ) -> Result<Value, ExecutionError> {
        let record = self.insert_pending(envelope, wallet_id, kind, |r| TransactionRecord {
            amount: Some(amount),
            from: Some(public_key.clone()),
            to: Some(recipient.clone()),
            ..r
        });

        let outcome = async {
            let unsigned = self
                .chain
                .build_native_transfer(public_key, recipient, amount, memo)
                .await?;
            self.sign_and_send(wallet_id, &unsigned).await
        }
        .await;

        self.settle_transfer(envelope, wallet_id, &record.id, outcome, count_transfer)
    }

    async fn run_token_transfer(
        &self,
        envelope: &IntentEnvelope,
        wallet_id: &str,
        public_key: &Address,
        mint: &Address,
        recipient: &Address,
        raw_amount: u64,
        memo: Option<String>,
    ) -> Result<Value, ExecutionError> {
        let record =
            self.insert_pending(envelope, wallet_id, "transfer_token", |r| TransactionRecord {
                amount: Some(raw_amount),
                from: Some(public_key.clone()),
                to: Some(recipient.clone()),
                mint: Some(mint.clone()),
                ..r
            });

        let outcome = async {
            let decimals = self.token_decimals(public_key, mint).await;
            let unsigned = self
                .chain
                .build_token_transfer(public_key, mint, recipient, raw_amount, decimals, memo)
                .await?;
            self.sign_and_send(wallet_id, &unsigned).await
        }
        .await;

        self.settle_transfer(envelope, wallet_id, &record.id, outcome, true)
    }

    async fn run_autonomous(
        &self,
        envelope: &IntentEnvelope,
        wallet_id: &str,
        public_key: &Address,
        balance: u64,
        action: &str,
        params: &Value,
    ) -> Result<Value, ExecutionError> {
        match action {
            "airdrop" => {
                let amount = ui_amount_param(params, "amount")?;
                self.run_airdrop(envelope, wallet_id, public_key, amount, "airdrop")
                    .await
            }
            "transfer_sol" => {
                let recipient = address_param(params, "recipient")?;
                let amount = ui_amount_param(params, "amount")?;
                let memo = string_param(params, "memo");
                self.run_native_transfer(
                    envelope,
                    wallet_id,
                    public_key,
                    &recipient,
                    amount,
                    memo,
                    "transfer_sol",
                    true,
                )
                .await
            }
            "transfer_token" => {
                let mint = address_param(params, "mint")?;
                let recipient = address_param(params, "recipient")?;
                let raw_amount = params
                    .get("amount")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| {
                        ExecutionError::InvalidParams("amount must be raw token units".into())
                    })?;
                let memo = string_param(params, "memo");
                self.run_token_transfer(
                    envelope, wallet_id, public_key, &mint, &recipient, raw_amount, memo,
                )
                .await
            }
            "query_balance" | "check_balance" => Ok(json!({
                "balance": Balance::from_units(balance),
                "publicKey": public_key,
            })),
            "execute_instructions" => {
                let instructions = instructions_param(params)?;
                self.run_instructions(envelope, wallet_id, public_key, instructions, "execute_instructions")
                    .await
            }
            "raw_transaction" => {
                let encoded = params
                    .get("transaction")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ExecutionError::InvalidParams(
                            "transaction must be a base64 string".into(),
                        )
                    })?;
                let record = self.insert_pending(envelope, wallet_id, "raw_transaction", |r| r);
                let outcome = async {
                    let unsigned = self
                        .chain
                        .deserialize_and_rebind_fee_payer(encoded, public_key)
                        .await?;
                    self.sign_and_send(wallet_id, &unsigned).await
                }
                .await;
                self.settle_transfer(envelope, wallet_id, &record.id, outcome, true)
            }
            "swap" => {
                // swaps arrive pre-routed: the aggregator quote supplies the
                // instruction list, this wallet only rebinds and signs
                if params.get("instructions").is_some() {
                    let instructions = instructions_param(params)?;
                    self.run_instructions(envelope, wallet_id, public_key, instructions, "swap")
                        .await
                } else {
                    Err(ExecutionError::InvalidParams(
                        "swap requires routed instructions".into(),
                    ))
                }
            }
            "create_token" => {
                let decimals = params
                    .get("decimals")
                    .and_then(Value::as_u64)
                    .unwrap_or(9) as u8;
                let instruction = initialize_mint_instruction(public_key, decimals);
                self.run_instructions(envelope, wallet_id, public_key, vec![instruction], "create_token")
                    .await
            }
            unknown => {
                // forward compatibility: unknown actions carrying an
                // instruction array are treated as execute_instructions
                if params.get("instructions").map(Value::is_array) == Some(true) {
                    debug!("treating unknown action '{}' as execute_instructions", unknown);
                    let instructions = instructions_param(params)?;
                    self.run_instructions(
                        envelope,
                        wallet_id,
                        public_key,
                        instructions,
                        "execute_instructions",
                    )
                    .await
                } else {
                    Err(ExecutionError::UnsupportedAction(unknown.to_owned()))
                }
            }
        }
    }

    async fn run_instructions(
        &self,
        envelope: &IntentEnvelope,
        wallet_id: &str,
        public_key: &Address,
        instructions: Vec<Instruction>,
        kind: &str,
    ) -> Result<Value, ExecutionError> {
        let record = self.insert_pending(envelope, wallet_id, kind, |r| r);
        let outcome = async {
            let unsigned = self
                .chain
                .build_arbitrary_transaction(public_key, instructions, None)
                .await?;
            self.sign_and_send(wallet_id, &unsigned).await
        }
        .await;
        self.settle_transfer(envelope, wallet_id, &record.id, outcome, true)
    }

    // --- shared plumbing ---

    async fn sign_and_send(
        &self,
        wallet_id: &str,
        unsigned: &UnsignedTransaction,
    ) -> Result<(SignedTransaction, SendOutcome), ExecutionError> {
        let signed = self.vault.sign_transaction(wallet_id, unsigned)?;
        let outcome = self.chain.send_transaction(&signed, None).await?;
        Ok((signed, outcome))
    }

    fn settle_transfer(
        &self,
        envelope: &IntentEnvelope,
        wallet_id: &str,
        record_id: &str,
        outcome: Result<(SignedTransaction, SendOutcome), ExecutionError>,
        count_transfer: bool,
    ) -> Result<Value, ExecutionError> {
        match outcome {
            Ok((_, outcome)) => {
                if count_transfer {
                    if let Err(error) = self.vault.record_transfer(wallet_id) {
                        warn!("failed to record transfer for {}: {}", wallet_id, error);
                    }
                }
                self.finish_confirmed(record_id, &envelope.agent_id, |r| TransactionRecord {
                    signature: Some(outcome.signature.clone()),
                    ..r.clone()
                });
                Ok(json!({
                    "signature": outcome.signature,
                    "slot": outcome.slot,
                    "status": outcome.status,
                }))
            }
            Err(error) => {
                self.finish_failed(record_id, &envelope.agent_id, &error);
                Err(error)
            }
        }
    }

    fn insert_pending<F>(
        &self,
        envelope: &IntentEnvelope,
        wallet_id: &str,
        kind: &str,
        complete: F,
    ) -> Arc<TransactionRecord>
    where
        F: FnOnce(TransactionRecord) -> TransactionRecord,
    {
        let record = complete(TransactionRecord::pending(
            &envelope.id,
            wallet_id,
            Some(&envelope.agent_id),
            kind,
        ));
        self.ledger.insert(record)
    }

    fn finish_confirmed<F>(&self, record_id: &str, agent_id: &str, complete: F)
    where
        F: FnOnce(&TransactionRecord) -> TransactionRecord,
    {
        if let Some(updated) = self.ledger.update(record_id, |current| TransactionRecord {
            status: TransactionStatus::Confirmed,
            ..complete(current)
        }) {
            self.emit_transaction(agent_id, &updated);
        }
    }

    fn finish_failed<E: std::fmt::Display>(&self, record_id: &str, agent_id: &str, error: &E) {
        if let Some(updated) = self.ledger.update(record_id, |current| TransactionRecord {
            status: TransactionStatus::Failed,
            error: Some(error.to_string()),
            ..current.clone()
        }) {
            self.emit_transaction(agent_id, &updated);
        }
    }

    fn emit_transaction(&self, agent_id: &str, record: &TransactionRecord) {
        self.events.emit(SystemEvent::Transaction {
            agent_id: Some(agent_id.to_owned()),
            transaction: serde_json::to_value(record).unwrap_or(Value::Null),
        });
    }

    async fn token_decimals(&self, owner: &Address, mint: &Address) -> u8 {
        match self.chain.get_token_balances(owner).await {
            Ok(balances) => balances
                .iter()
                .find(|b| &b.mint == mint)
                .map(|b| b.decimals)
                .unwrap_or(9),
            Err(_) => 9,
        }
    }
}

// --- parameter helpers ---

fn ui_amount_param(params: &Value, key: &str) -> Result<u64, ExecutionError> {
    params
        .get(key)
        .and_then(Value::as_f64)
        .and_then(from_ui_amount)
        .ok_or_else(|| {
            ExecutionError::InvalidParams(format!("{} must be a non-negative amount", key))
        })
}

fn address_param(params: &Value, key: &str) -> Result<Address, ExecutionError> {
    let raw = params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ExecutionError::InvalidParams(format!("{} must be an address", key)))?;
    Address::parse(raw)
        .map_err(|e| ExecutionError::InvalidParams(format!("{} '{}': {}", key, raw, e)))
}

fn string_param(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn instructions_param(params: &Value) -> Result<Vec<Instruction>, ExecutionError> {
    let raw = params
        .get("instructions")
        .cloned()
        .ok_or_else(|| ExecutionError::InvalidParams("instructions array required".into()))?;
    serde_json::from_value(raw)
        .map_err(|e| ExecutionError::InvalidParams(format!("instructions: {}", e)))
}

// Token-program initialize-mint instruction (opcode 0, decimals, authority)
fn initialize_mint_instruction(authority: &Address, decimals: u8) -> Instruction {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    let data = vec![0u8, decimals];
    Instruction {
        program_id: Address::parse(crate::chain::TOKEN_PROGRAM_ID)
            .expect("token program id is valid"),
        accounts: vec![aegis_common::transaction::AccountMeta {
            pubkey: authority.clone(),
            is_signer: true,
            is_writable: true,
        }],
        data: BASE64.encode(data),
    }
}
