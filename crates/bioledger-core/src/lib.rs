pub mod constants;
pub mod error;
pub mod model;
pub mod types;

pub use error::BioLedgerError;
pub use types::{Address, CredentialId, MaterialId, Timestamp, TransferId};
