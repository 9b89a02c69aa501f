// Daemon configuration: environment variables first, CLI flags override.
//
// Startup fails closed on a mainnet network selection and on a weak or
// default key-encryption secret in production.

use std::env;
use std::str::FromStr;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use thiserror::Error;

use aegis_common::{
    config::{DEFAULT_KEY_ENCRYPTION_SECRET, MIN_KEY_ENCRYPTION_SECRET_LEN},
    network::Network,
};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_WS_PORT: u16 = 3001;
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8899";
pub const DEFAULT_MAX_AGENTS: usize = 10;
pub const DEFAULT_LOOP_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_CONFIRMATION_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
    #[error("mainnet operation is forbidden; set NETWORK to devnet, testnet or localnet")]
    MainnetForbidden,
    #[error("KEY_ENCRYPTION_SECRET must be at least {MIN_KEY_ENCRYPTION_SECRET_LEN} characters")]
    WeakSecret,
    #[error("KEY_ENCRYPTION_SECRET must be changed from the default in production")]
    DefaultSecretInProduction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[clap(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// CLI flags. Every flag falls back to its environment variable.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "aegis-daemon", about = "Aegis agentic wallet platform daemon")]
pub struct CliArgs {
    /// HTTP API port (env: PORT)
    #[arg(long)]
    pub port: Option<u16>,
    /// WebSocket port (env: WS_PORT)
    #[arg(long)]
    pub ws_port: Option<u16>,
    /// Chain RPC endpoint (env: RPC_URL)
    #[arg(long)]
    pub rpc_url: Option<String>,
    /// Target network; mainnet is refused (env: NETWORK)
    #[arg(long)]
    pub network: Option<String>,
    /// Maximum number of built-in agents (env: MAX_AGENTS)
    #[arg(long)]
    pub max_agents: Option<usize>,
    /// Log level (env: LOG_LEVEL)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub port: u16,
    pub ws_port: u16,
    pub rpc_url: String,
    pub network: Network,
    pub key_encryption_secret: String,
    pub admin_api_key: Option<String>,
    pub max_agents: usize,
    pub agent_loop_interval_ms: u64,
    pub max_retries: u32,
    pub confirmation_timeout_ms: u64,
    pub log_level: LogLevel,
}

fn env_parsed<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key: key.to_owned(),
                reason: e.to_string(),
            }),
        _ => Ok(None),
    }
}

impl DaemonConfig {
    pub fn load(args: &CliArgs) -> Result<Self, ConfigError> {
        let network = match &args.network {
            Some(raw) => raw.parse::<Network>().map_err(|e| ConfigError::Invalid {
                key: "NETWORK".to_owned(),
                reason: e.to_string(),
            })?,
            None => env_parsed::<Network>("NETWORK")?.unwrap_or(Network::Devnet),
        };
        if network.is_mainnet() {
            return Err(ConfigError::MainnetForbidden);
        }

        let key_encryption_secret = env::var("KEY_ENCRYPTION_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_KEY_ENCRYPTION_SECRET.to_owned());
        if key_encryption_secret.len() < MIN_KEY_ENCRYPTION_SECRET_LEN {
            return Err(ConfigError::WeakSecret);
        }
        let production = env::var("NODE_ENV").is_ok_and(|v| v == "production");
        if production && key_encryption_secret == DEFAULT_KEY_ENCRYPTION_SECRET {
            return Err(ConfigError::DefaultSecretInProduction);
        }

        Ok(DaemonConfig {
            port: args
                .port
                .or(env_parsed("PORT")?)
                .unwrap_or(DEFAULT_PORT),
            ws_port: args
                .ws_port
                .or(env_parsed("WS_PORT")?)
                .unwrap_or(DEFAULT_WS_PORT),
            rpc_url: args
                .rpc_url
                .clone()
                .or(env::var("RPC_URL").ok().filter(|s| !s.is_empty()))
                .unwrap_or_else(|| DEFAULT_RPC_URL.to_owned()),
            network,
            key_encryption_secret,
            admin_api_key: env::var("ADMIN_API_KEY").ok().filter(|s| !s.is_empty()),
            max_agents: args
                .max_agents
                .or(env_parsed("MAX_AGENTS")?)
                .unwrap_or(DEFAULT_MAX_AGENTS),
            agent_loop_interval_ms: env_parsed("AGENT_LOOP_INTERVAL_MS")?
                .unwrap_or(DEFAULT_LOOP_INTERVAL_MS),
            max_retries: env_parsed("MAX_RETRIES")?.unwrap_or(DEFAULT_MAX_RETRIES),
            confirmation_timeout_ms: env_parsed("CONFIRMATION_TIMEOUT_MS")?
                .unwrap_or(DEFAULT_CONFIRMATION_TIMEOUT_MS),
            log_level: args
                .log_level
                .or(env_parsed("LOG_LEVEL")?)
                .unwrap_or(LogLevel::Info),
        })
    }
}
