// JSON-RPC chain client over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use log::{debug, trace, warn};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use aegis_common::{
    config::AIRDROP_HARD_CAP,
    crypto::{Address, Signature},
    network::Network,
    transaction::{SignedTransaction, UnsignedTransaction},
};

use super::{
    error::{classify_send_error, ChainError},
    AirdropReceipt, Balance, ChainClient, SendOptions, SendOutcome, TokenBalance,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
const CONFIRMATION_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_SIGNATURE_FEE: u64 = 5_000;

pub struct HttpChainClient {
    http: reqwest::Client,
    url: String,
    network: Network,
    max_retries: u32,
    confirmation_timeout: Duration,
    request_id: AtomicU64,
}

impl HttpChainClient {
    pub fn new(
        url: String,
        network: Network,
        max_retries: u32,
        confirmation_timeout: Duration,
    ) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(HttpChainClient {
            http,
            url,
            network,
            max_retries,
            confirmation_timeout,
            request_id: AtomicU64::new(1),
        })
    }

    async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<R, ChainError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        trace!("rpc call {} #{}", method, id);

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        if let Some(error) = payload.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown rpc error")
                .to_owned();
            return Err(ChainError::Rpc { code, message });
        }

        let result = payload
            .get("result")
            .cloned()
            .ok_or_else(|| ChainError::MalformedResponse("missing result".into()))?;
        serde_json::from_value(result).map_err(|e| ChainError::MalformedResponse(e.to_string()))
    }

    // Poll signature status until confirmed commitment or timeout
    async fn wait_for_confirmation(&self, signature: &Signature) -> Result<u64, ChainError> {
        let deadline = tokio::time::Instant::now() + self.confirmation_timeout;
        loop {
            let statuses: Value = self
                .call(
                    "getSignatureStatuses",
                    json!([[signature.as_str()], {"searchTransactionHistory": true}]),
                )
                .await?;
            let status = &statuses["value"][0];
            if !status.is_null() {
                if let Some(err) = status.get("err").filter(|e| !e.is_null()) {
                    return Err(classify_send_error(ChainError::Rpc {
                        code: 0,
                        message: format!("transaction failed on chain: {}", err),
                    }));
                }
                let confirmation = status
                    .get("confirmationStatus")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if confirmation == "confirmed" || confirmation == "finalized" {
                    return Ok(status.get("slot").and_then(Value::as_u64).unwrap_or(0));
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ChainError::ConfirmationTimeout(self.confirmation_timeout));
            }
            tokio::time::sleep(CONFIRMATION_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn check_health(&self) -> Result<(), ChainError> {
        let status: Value = self.call("getHealth", json!([])).await?;
        match status.as_str() {
            Some("ok") => Ok(()),
            other => Err(ChainError::Unhealthy(
                other.unwrap_or("unknown status").to_owned(),
            )),
        }
    }

    async fn get_balance(&self, address: &Address) -> Result<Balance, ChainError> {
        let response: Value = self
            .call("getBalance", json!([address.as_str()]))
            .await?;
        let units = response
            .get("value")
            .and_then(Value::as_u64)
            .ok_or_else(|| ChainError::MalformedResponse("getBalance: missing value".into()))?;
        Ok(Balance::from_units(units))
    }

    async fn get_token_balances(
        &self,
        address: &Address,
    ) -> Result<Vec<TokenBalance>, ChainError> {
        let response: Value = self
            .call(
                "getTokenAccountsByOwner",
                json!([
                    address.as_str(),
                    {"programId": super::TOKEN_PROGRAM_ID},
                    {"encoding": "jsonParsed"},
                ]),
            )
            .await?;

        let accounts = response
            .get("value")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut balances = Vec::with_capacity(accounts.len());
        for account in accounts {
            let info = &account["account"]["data"]["parsed"]["info"];
            let Some(mint) = info.get("mint").and_then(Value::as_str) else {
                continue;
            };
            let Ok(mint) = Address::parse(mint) else {
                warn!("skipping token account with malformed mint");
                continue;
            };
            let token_amount = &info["tokenAmount"];
            let amount = token_amount
                .get("amount")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(0);
            let decimals = token_amount
                .get("decimals")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u8;
            let ui_amount = token_amount
                .get("uiAmount")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            balances.push(TokenBalance {
                mint,
                amount,
                decimals,
                ui_amount,
            });
        }
        Ok(balances)
    }

    async fn request_airdrop(
        &self,
        address: &Address,
        amount: u64,
    ) -> Result<AirdropReceipt, ChainError> {
        if !self.network.supports_airdrop() {
            return Err(ChainError::AirdropUnsupported(self.network));
        }
        if amount > AIRDROP_HARD_CAP {
            return Err(ChainError::AirdropOverCap {
                requested: amount,
                cap: AIRDROP_HARD_CAP,
            });
        }

        let signature: String = self
            .call("requestAirdrop", json!([address.as_str(), amount]))
            .await?;
        let signature = Signature::from(signature);
        let slot = self.wait_for_confirmation(&signature).await?;
        debug!("airdrop of {} units to {} confirmed", amount, address);
        Ok(AirdropReceipt { signature, slot })
    }

    async fn latest_blockhash(&self) -> Result<String, ChainError> {
        let response: Value = self.call("getLatestBlockhash", json!([])).await?;
        response["value"]["blockhash"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| {
                ChainError::MalformedResponse("getLatestBlockhash: missing blockhash".into())
            })
    }

    async fn get_recent_signatures(
        &self,
        address: &Address,
        limit: usize,
    ) -> Result<Vec<Signature>, ChainError> {
        let response: Vec<Value> = self
            .call(
                "getSignaturesForAddress",
                json!([address.as_str(), {"limit": limit}]),
            )
            .await?;
        Ok(response
            .iter()
            .filter_map(|entry| entry.get("signature").and_then(Value::as_str))
            .map(|s| Signature::from(s.to_owned()))
            .collect())
    }

    async fn send_transaction(
        &self,
        transaction: &SignedTransaction,
        options: Option<SendOptions>,
    ) -> Result<SendOutcome, ChainError> {
        let options = options.unwrap_or_default();
        let max_attempts = options.max_retries.unwrap_or(self.max_retries).max(1);

        let encoded = BASE64.encode(
            serde_json::to_vec(transaction)
                .map_err(|e| ChainError::MalformedResponse(e.to_string()))?,
        );

        let mut attempt = 0;
        loop {
            attempt += 1;
            let result: Result<String, ChainError> = self
                .call(
                    "sendTransaction",
                    json!([encoded, {
                        "encoding": "base64",
                        "skipPreflight": options.skip_preflight,
                    }]),
                )
                .await;

            match result {
                Ok(signature) => {
                    let signature = Signature::from(signature);
                    let slot = self.wait_for_confirmation(&signature).await?;
                    return Ok(SendOutcome {
                        signature,
                        slot,
                        status: "confirmed".to_owned(),
                    });
                }
                Err(error) => {
                    let error = classify_send_error(error);
                    if !error.is_retryable() || attempt >= max_attempts {
                        return Err(error);
                    }
                    let delay = RETRY_BASE_DELAY * 2u32.saturating_pow(attempt - 1);
                    warn!(
                        "send attempt {}/{} failed ({}), retrying in {:?}",
                        attempt, max_attempts, error, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn estimate_fee(&self, transaction: &UnsignedTransaction) -> Result<u64, ChainError> {
        let message = BASE64.encode(
            serde_json::to_vec(transaction.message())
                .map_err(|e| ChainError::MalformedResponse(e.to_string()))?,
        );
        let response: Value = self.call("getFeeForMessage", json!([message])).await?;
        Ok(response
            .get("value")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_SIGNATURE_FEE))
    }
}
