// Chain access capability.
//
// The rest of the daemon depends on the `ChainClient` trait only; the
// HTTP JSON-RPC implementation is wired in at boot and the in-memory mock
// substitutes for it in tests. Nothing outside this module performs
// network I/O against the chain.

mod build;
mod error;
mod http;
mod mock;

pub use build::{MEMO_PROGRAM_ID, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID};
pub use error::ChainError;
pub use http::HttpChainClient;
pub use mock::MockChainClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use aegis_common::{
    crypto::{Address, Signature},
    transaction::{Instruction, SignedTransaction, UnsignedTransaction},
    utils::to_ui_amount,
};

/// Native balance of an account in both representations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub native: f64,
    pub raw_units: u64,
}

impl Balance {
    pub fn from_units(raw_units: u64) -> Self {
        Balance {
            native: to_ui_amount(raw_units),
            raw_units,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub mint: Address,
    pub amount: u64,
    pub decimals: u8,
    pub ui_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirdropReceipt {
    pub signature: Signature,
    pub slot: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    pub signature: Signature,
    pub slot: u64,
    pub status: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SendOptions {
    pub skip_preflight: bool,
    pub max_retries: Option<u32>,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn check_health(&self) -> Result<(), ChainError>;

    async fn get_balance(&self, address: &Address) -> Result<Balance, ChainError>;

    async fn get_token_balances(&self, address: &Address)
        -> Result<Vec<TokenBalance>, ChainError>;

    /// Request test funds. Fails unless the configured network supports
    /// airdrops, and rejects amounts beyond the hard per-request cap.
    async fn request_airdrop(
        &self,
        address: &Address,
        amount: u64,
    ) -> Result<AirdropReceipt, ChainError>;

    async fn latest_blockhash(&self) -> Result<String, ChainError>;

    async fn get_recent_signatures(
        &self,
        address: &Address,
        limit: usize,
    ) -> Result<Vec<Signature>, ChainError>;

    /// Submit a signed transaction and wait for confirmed commitment.
    /// Transient failures are retried with exponential backoff; the closed
    /// set of non-retryable chain errors fails immediately.
    async fn send_transaction(
        &self,
        transaction: &SignedTransaction,
        options: Option<SendOptions>,
    ) -> Result<SendOutcome, ChainError>;

    async fn estimate_fee(&self, transaction: &UnsignedTransaction) -> Result<u64, ChainError>;

    // Builders share the implementation below; only the blockhash fetch
    // differs per backend.

    async fn build_native_transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: u64,
        memo: Option<String>,
    ) -> Result<UnsignedTransaction, ChainError> {
        let blockhash = self.latest_blockhash().await?;
        Ok(build::native_transfer(from, to, amount, memo, blockhash))
    }

    async fn build_token_transfer(
        &self,
        owner: &Address,
        mint: &Address,
        recipient: &Address,
        raw_amount: u64,
        decimals: u8,
        memo: Option<String>,
    ) -> Result<UnsignedTransaction, ChainError> {
        let blockhash = self.latest_blockhash().await?;
        Ok(build::token_transfer(
            owner, mint, recipient, raw_amount, decimals, memo, blockhash,
        ))
    }

    async fn build_arbitrary_transaction(
        &self,
        fee_payer: &Address,
        instructions: Vec<Instruction>,
        memo: Option<String>,
    ) -> Result<UnsignedTransaction, ChainError> {
        let blockhash = self.latest_blockhash().await?;
        Ok(build::arbitrary(fee_payer, instructions, memo, blockhash))
    }

    /// Decode a caller-supplied serialized transaction, rebind its fee payer
    /// and refresh the blockhash so the platform wallet signs a live message.
    async fn deserialize_and_rebind_fee_payer(
        &self,
        encoded: &str,
        fee_payer: &Address,
    ) -> Result<UnsignedTransaction, ChainError> {
        let mut transaction = UnsignedTransaction::from_base64(encoded)?;
        let blockhash = self.latest_blockhash().await?;
        let message = transaction.message_mut();
        message.fee_payer = fee_payer.clone();
        message.recent_blockhash = blockhash;
        Ok(transaction)
    }
}
