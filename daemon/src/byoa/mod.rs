// Bring-your-own-agent (BYOA) support: registration and token custody,
// wallet binding, and the intent router that external agents submit
// through.

mod binder;
mod registry;
mod router;

pub use binder::{BinderError, WalletBinder};
pub use registry::{
    ExternalAgentInfo, ExternalAgentKind, ExternalAgentRegistry, ExternalAgentStatus,
    Registration, RegistrationReceipt, RegistryError,
};
pub use router::{IntentRouter, RateLimiter, RouterError};
