// Chain transaction model shared by the vault (signing) and the daemon
// (building and sending). The platform treats transactions as structured
// messages; the chain client is responsible for turning them into whatever
// the RPC node expects.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{Address, Signature};

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("invalid base64 payload")]
    InvalidBase64,
    #[error("malformed transaction payload: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountMeta {
    pub pubkey: Address,
    pub is_signer: bool,
    pub is_writable: bool,
}

/// A single program invocation. `data` is base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    pub program_id: Address,
    #[serde(default)]
    pub accounts: Vec<AccountMeta>,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMessage {
    pub fee_payer: Address,
    pub recent_blockhash: String,
    pub instructions: Vec<Instruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// Unsigned transaction in either the legacy or the versioned shape.
/// The vault dispatches on this variant when signing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum UnsignedTransaction {
    Legacy { message: TransactionMessage },
    Versioned { message: TransactionMessage },
}

impl UnsignedTransaction {
    pub fn message(&self) -> &TransactionMessage {
        match self {
            UnsignedTransaction::Legacy { message }
            | UnsignedTransaction::Versioned { message } => message,
        }
    }

    pub fn message_mut(&mut self) -> &mut TransactionMessage {
        match self {
            UnsignedTransaction::Legacy { message }
            | UnsignedTransaction::Versioned { message } => message,
        }
    }

    pub fn shape(&self) -> &'static str {
        match self {
            UnsignedTransaction::Legacy { .. } => "legacy",
            UnsignedTransaction::Versioned { .. } => "versioned",
        }
    }

    // Canonical byte stream covered by the signature. The shape is bound
    // into the stream so a legacy signature never verifies for a versioned
    // message.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, TransactionError> {
        let body = serde_json::to_vec(self.message())
            .map_err(|e| TransactionError::Malformed(e.to_string()))?;
        let mut bytes = Vec::with_capacity(body.len() + 8);
        bytes.extend_from_slice(self.shape().as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    pub fn to_base64(&self) -> Result<String, TransactionError> {
        let json = serde_json::to_vec(self)
            .map_err(|e| TransactionError::Malformed(e.to_string()))?;
        Ok(BASE64.encode(json))
    }

    pub fn from_base64(encoded: &str) -> Result<Self, TransactionError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|_| TransactionError::InvalidBase64)?;
        serde_json::from_slice(&bytes).map_err(|e| TransactionError::Malformed(e.to_string()))
    }
}

/// A transaction together with the fee payer's signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    pub transaction: UnsignedTransaction,
    pub signature: Signature,
    pub signer: Address,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::WalletKeypair;

    fn sample_message(fee_payer: Address) -> TransactionMessage {
        TransactionMessage {
            fee_payer,
            recent_blockhash: "9sHcv6xwn9YkB8nxTUGKDwPwNnmqVp5oLfpnVpWcebqU".into(),
            instructions: vec![],
            memo: None,
        }
    }

    #[test]
    fn base64_round_trip() {
        let keypair = WalletKeypair::generate();
        let tx = UnsignedTransaction::Legacy {
            message: sample_message(keypair.address()),
        };
        let encoded = tx.to_base64().unwrap();
        let decoded = UnsignedTransaction::from_base64(&encoded).unwrap();
        assert_eq!(decoded.message().fee_payer, keypair.address());
    }

    #[test]
    fn shape_is_bound_into_signing_bytes() {
        let keypair = WalletKeypair::generate();
        let legacy = UnsignedTransaction::Legacy {
            message: sample_message(keypair.address()),
        };
        let versioned = UnsignedTransaction::Versioned {
            message: sample_message(keypair.address()),
        };
        assert_ne!(
            legacy.signing_bytes().unwrap(),
            versioned.signing_bytes().unwrap()
        );
    }
}
