pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Amounts are tracked in atomic units with 9 decimals
pub const COIN_DECIMALS: u8 = 9;
pub const UNITS_PER_COIN: u64 = 1_000_000_000;

// Reserve kept aside for the network fee of a native transfer
pub const FEE_RESERVE: u64 = 5_000_000;
// Token transfers may need to fund an associated token account on top of the fee
pub const TOKEN_FEE_RESERVE: u64 = 10_000_000;

// Hard per-request cap enforced by the chain client on airdrops
pub const AIRDROP_HARD_CAP: u64 = 5 * UNITS_PER_COIN;

// Residual balance floor that autonomous intents can never spend below,
// even when the per-wallet policy configures a lower minimum
pub const AUTONOMOUS_SAFETY_FLOOR: u64 = 10_000_000;

// How many recent transaction signatures are handed to a strategy per cycle
pub const MAX_CONTEXT_SIGNATURES: usize = 10;

// Bounded in-memory history sizes
pub const DEFAULT_MAX_TRANSACTIONS: usize = 10_000;
pub const DEFAULT_MAX_EVENT_HISTORY: usize = 1_000;
pub const DEFAULT_MAX_INTENT_HISTORY: usize = 5_000;
pub const DEFAULT_MAX_SUBSCRIBERS: usize = 100;

// Per external agent, sliding one-minute window
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 30;
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;

// Built-in agent cadence bounds
pub const MIN_CYCLE_INTERVAL_MS: u64 = 5_000;
pub const MAX_CYCLE_INTERVAL_MS: u64 = 3_600_000;

// External agent registration constraints
pub const MIN_AGENT_NAME_LEN: usize = 1;
pub const MAX_AGENT_NAME_LEN: usize = 100;
pub const CONTROL_TOKEN_SIZE: usize = 32;

// Sentinel that must be replaced before running in production
pub const DEFAULT_KEY_ENCRYPTION_SECRET: &str = "insecure-dev-key-encryption-secret";
pub const MIN_KEY_ENCRYPTION_SECRET_LEN: usize = 16;
