pub mod cipher;
pub mod error;
pub mod policy;
pub mod vault;

pub use error::VaultError;
pub use policy::{PolicyPatch, PolicyViolation, SpendingPolicy};
pub use vault::{WalletInfo, WalletVault};
