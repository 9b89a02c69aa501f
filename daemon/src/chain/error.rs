use std::time::Duration;

use thiserror::Error;

use aegis_common::{network::Network, transaction::TransactionError};

// Substrings identifying chain errors that must never be retried
const NON_RETRYABLE_MARKERS: [&str; 6] = [
    "insufficient funds",
    "invalid account",
    "invalid blockhash",
    "blockhash not found",
    "transaction too large",
    "account not found",
];

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("rpc transport error: {0}")]
    Transport(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("node unhealthy: {0}")]
    Unhealthy(String),
    #[error("malformed rpc response: {0}")]
    MalformedResponse(String),
    #[error("airdrops are not available on {0}")]
    AirdropUnsupported(Network),
    #[error("airdrop of {requested} units exceeds the per-request cap of {cap}")]
    AirdropOverCap { requested: u64, cap: u64 },
    #[error("transaction rejected: {0}")]
    NonRetryable(String),
    #[error("transaction not confirmed within {0:?}")]
    ConfirmationTimeout(Duration),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl ChainError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ChainError::Transport(_) => true,
            ChainError::Rpc { message, .. } => !is_non_retryable_message(message),
            ChainError::NonRetryable(_)
            | ChainError::AirdropUnsupported(_)
            | ChainError::AirdropOverCap { .. }
            | ChainError::ConfirmationTimeout(_)
            | ChainError::Transaction(_)
            | ChainError::MalformedResponse(_)
            | ChainError::Unhealthy(_) => false,
        }
    }
}

pub fn is_non_retryable_message(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    NON_RETRYABLE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

// Promote RPC send errors carrying a terminal cause to `NonRetryable`
pub fn classify_send_error(error: ChainError) -> ChainError {
    match error {
        ChainError::Rpc { ref message, .. } if is_non_retryable_message(message) => {
            ChainError::NonRetryable(message.clone())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_errors_are_not_retried() {
        let err = classify_send_error(ChainError::Rpc {
            code: -32002,
            message: "Transaction simulation failed: Insufficient funds for fee".into(),
        });
        assert!(matches!(err, ChainError::NonRetryable(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn transport_errors_are_retried() {
        assert!(ChainError::Transport("connection reset".into()).is_retryable());
    }
}
