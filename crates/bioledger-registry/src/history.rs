//! Append-only per-material history log (C6).
//!
//! Each mutation on the registry appends exactly one 32-byte digest, hashed
//! from `(event_tag, actor, salient_fields, timestamp)` via the canonical
//! hasher. No pruning, no re-ordering, no modification — only append and
//! paginated read.

use bioledger_core::error::BioLedgerError;
use bioledger_core::model::{EventTag, HistoryEvent};
use bioledger_core::types::{Address, MaterialId, Timestamp};
use bioledger_crypto::canonical;

use crate::db::StateDb;

/// Compute the digest for one history event and append it to
/// `material_id`'s history. Returns the new history length.
pub fn record(
    db: &StateDb,
    material_id: &MaterialId,
    event_tag: EventTag,
    actor: &Address,
    salient_fields: serde_json::Value,
    timestamp: Timestamp,
) -> Result<u64, BioLedgerError> {
    let event = HistoryEvent {
        event_tag,
        actor: actor.clone(),
        salient_fields,
        timestamp,
    };
    let digest = canonical::hash(&event)?;
    db.append_history(material_id, digest)
}

pub fn count(db: &StateDb, material_id: &MaterialId) -> Result<u64, BioLedgerError> {
    db.history_count(material_id)
}

pub fn at(db: &StateDb, material_id: &MaterialId, index: u64) -> Result<Option<[u8; 32]>, BioLedgerError> {
    db.history_at(material_id, index)
}

pub fn slice(
    db: &StateDb,
    material_id: &MaterialId,
    offset: u64,
    limit: u64,
) -> Result<Vec<[u8; 32]>, BioLedgerError> {
    db.history_slice(material_id, offset, limit)
}
