pub mod integrity;
pub mod predicate;

pub use integrity::{check_credential, InMemoryObjectStore, IntegrityOutcome, NotFound, ObjectStore};
pub use predicate::{verify_material, verify_material_at, verify_material_full, VerificationResult};
