mod address;
mod keypair;
mod token;

pub use address::{Address, AddressError};
pub use keypair::{Signature, WalletKeypair, SECRET_KEY_SIZE};
pub use token::{constant_time_eq, generate_control_token, hash_token, TokenHash};
