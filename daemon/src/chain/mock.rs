// In-memory chain backend for tests and offline development. Mirrors the
// observable behavior of the HTTP client closely enough that orchestrator
// and router logic can be exercised without a node.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rand::RngCore;

use aegis_common::{
    config::AIRDROP_HARD_CAP,
    crypto::{Address, Signature},
    network::Network,
    transaction::{SignedTransaction, UnsignedTransaction},
};

use super::{
    build::decode_transfer_amount, error::ChainError, AirdropReceipt, Balance, ChainClient,
    SendOptions, SendOutcome, TokenBalance,
};

const MOCK_FEE: u64 = 5_000;

#[derive(Default)]
struct MockState {
    balances: HashMap<Address, u64>,
    token_balances: HashMap<Address, Vec<TokenBalance>>,
    signatures: HashMap<Address, Vec<Signature>>,
    sent: Vec<SignedTransaction>,
    airdrops: Vec<(Address, u64)>,
    fail_next_send: Option<String>,
    healthy: bool,
    // artificial delay on balance lookups, for cycle-overlap tests
    balance_latency: Option<std::time::Duration>,
}

pub struct MockChainClient {
    network: Network,
    state: Mutex<MockState>,
    slot: AtomicU64,
    calls: AtomicU64,
}

impl MockChainClient {
    pub fn new(network: Network) -> Self {
        MockChainClient {
            network,
            state: Mutex::new(MockState {
                healthy: true,
                ..MockState::default()
            }),
            slot: AtomicU64::new(100),
            calls: AtomicU64::new(0),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_slot(&self) -> u64 {
        self.slot.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn random_signature() -> Signature {
        let mut bytes = [0u8; 64];
        rand::thread_rng().fill_bytes(&mut bytes);
        Signature::from_bytes(&bytes)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    // --- test helpers ---

    pub fn set_balance(&self, address: &Address, units: u64) {
        self.state().balances.insert(address.clone(), units);
    }

    pub fn balance_of(&self, address: &Address) -> u64 {
        self.state().balances.get(address).copied().unwrap_or(0)
    }

    pub fn set_token_balances(&self, address: &Address, balances: Vec<TokenBalance>) {
        self.state()
            .token_balances
            .insert(address.clone(), balances);
    }

    pub fn fail_next_send<S: Into<String>>(&self, message: S) {
        self.state().fail_next_send = Some(message.into());
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.state().healthy = healthy;
    }

    pub fn set_balance_latency(&self, latency: std::time::Duration) {
        self.state().balance_latency = Some(latency);
    }

    pub fn sent_transactions(&self) -> Vec<SignedTransaction> {
        self.state().sent.clone()
    }

    pub fn airdrops(&self) -> Vec<(Address, u64)> {
        self.state().airdrops.clone()
    }

    /// Total number of chain operations performed, for asserting that a
    /// rejected intent produced no chain traffic.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn check_health(&self) -> Result<(), ChainError> {
        self.touch();
        if self.state().healthy {
            Ok(())
        } else {
            Err(ChainError::Unhealthy("behind".into()))
        }
    }

    async fn get_balance(&self, address: &Address) -> Result<Balance, ChainError> {
        self.touch();
        let latency = self.state().balance_latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(Balance::from_units(self.balance_of(address)))
    }

    async fn get_token_balances(
        &self,
        address: &Address,
    ) -> Result<Vec<TokenBalance>, ChainError> {
        self.touch();
        Ok(self
            .state()
            .token_balances
            .get(address)
            .cloned()
            .unwrap_or_default())
    }

    async fn request_airdrop(
        &self,
        address: &Address,
        amount: u64,
    ) -> Result<AirdropReceipt, ChainError> {
        self.touch();
        if !self.network.supports_airdrop() {
            return Err(ChainError::AirdropUnsupported(self.network));
        }
        if amount > AIRDROP_HARD_CAP {
            return Err(ChainError::AirdropOverCap {
                requested: amount,
                cap: AIRDROP_HARD_CAP,
            });
        }

        let signature = Self::random_signature();
        let mut state = self.state();
        *state.balances.entry(address.clone()).or_insert(0) += amount;
        state.airdrops.push((address.clone(), amount));
        state
            .signatures
            .entry(address.clone())
            .or_default()
            .push(signature.clone());
        Ok(AirdropReceipt {
            signature,
            slot: self.next_slot(),
        })
    }

    async fn latest_blockhash(&self) -> Result<String, ChainError> {
        self.touch();
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Ok(bs58::encode(bytes).into_string())
    }

    async fn get_recent_signatures(
        &self,
        address: &Address,
        limit: usize,
    ) -> Result<Vec<Signature>, ChainError> {
        self.touch();
        let state = self.state();
        let signatures = state.signatures.get(address).cloned().unwrap_or_default();
        Ok(signatures.into_iter().rev().take(limit).collect())
    }

    async fn send_transaction(
        &self,
        transaction: &SignedTransaction,
        _options: Option<SendOptions>,
    ) -> Result<SendOutcome, ChainError> {
        self.touch();
        let mut state = self.state();
        if let Some(message) = state.fail_next_send.take() {
            return Err(super::error::classify_send_error(ChainError::Rpc {
                code: -32002,
                message,
            }));
        }

        let fee_payer = transaction.transaction.message().fee_payer.clone();
        let mut debit = MOCK_FEE;
        let mut credits: Vec<(Address, u64)> = Vec::new();
        for instruction in &transaction.transaction.message().instructions {
            if let Some(amount) = decode_transfer_amount(instruction) {
                debit += amount;
                if let Some(to) = instruction.accounts.get(1) {
                    credits.push((to.pubkey.clone(), amount));
                }
            }
        }

        let balance = state.balances.entry(fee_payer.clone()).or_insert(0);
        if *balance < debit {
            return Err(ChainError::NonRetryable(
                "insufficient funds for transaction".into(),
            ));
        }
        *balance -= debit;
        for (to, amount) in credits {
            *state.balances.entry(to).or_insert(0) += amount;
        }

        state.sent.push(transaction.clone());
        state
            .signatures
            .entry(fee_payer)
            .or_default()
            .push(transaction.signature.clone());

        Ok(SendOutcome {
            signature: transaction.signature.clone(),
            slot: self.next_slot(),
            status: "confirmed".to_owned(),
        })
    }

    async fn estimate_fee(&self, _transaction: &UnsignedTransaction) -> Result<u64, ChainError> {
        self.touch();
        Ok(MOCK_FEE)
    }
}
