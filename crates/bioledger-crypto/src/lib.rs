pub mod canonical;
pub mod ecdsa;
pub mod keypair;

pub use canonical::{canonicalize, hash};
pub use ecdsa::{sign, verify_signature, SignatureError};
pub use keypair::KeyPair;
