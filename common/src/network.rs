use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid network '{0}'")]
pub struct InvalidNetwork(String);

// Which cluster the platform is pointed at.
// Mainnet is recognised only so startup can refuse it explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Devnet,
    Testnet,
    Localnet,
    Mainnet,
}

impl Network {
    pub fn is_mainnet(&self) -> bool {
        matches!(self, Network::Mainnet)
    }

    // airdrops are only available on test clusters
    pub fn supports_airdrop(&self) -> bool {
        !self.is_mainnet()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Devnet => "devnet",
            Network::Testnet => "testnet",
            Network::Localnet => "localnet",
            Network::Mainnet => "mainnet",
        }
    }

    // cluster query parameter used when building explorer URLs
    pub fn explorer_cluster(&self) -> &'static str {
        match self {
            Network::Devnet => "devnet",
            Network::Testnet => "testnet",
            Network::Localnet => "custom",
            Network::Mainnet => "mainnet-beta",
        }
    }
}

impl FromStr for Network {
    type Err = InvalidNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "devnet" => Ok(Network::Devnet),
            "testnet" => Ok(Network::Testnet),
            "localnet" | "local" | "localhost" => Ok(Network::Localnet),
            "mainnet" | "mainnet-beta" => Ok(Network::Mainnet),
            other => Err(InvalidNetwork(other.to_owned())),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_aliases() {
        assert_eq!("devnet".parse::<Network>().unwrap(), Network::Devnet);
        assert_eq!("MAINNET-BETA".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("local".parse::<Network>().unwrap(), Network::Localnet);
        assert!("unknown".parse::<Network>().is_err());
    }

    #[test]
    fn mainnet_has_no_airdrop() {
        assert!(!Network::Mainnet.supports_airdrop());
        assert!(Network::Devnet.supports_airdrop());
    }
}
