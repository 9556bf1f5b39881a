use std::path::Path;

use bioledger_core::error::BioLedgerError;
use bioledger_core::model::{Credential, IssuerPermission, Material, Transfer};
use bioledger_core::types::{Address, CredentialId, MaterialId, TransferId};

/// Persistent registry state, backed by sled (pure-Rust, no C dependencies).
///
/// Named trees:
///   materials           — MaterialId utf8 bytes   → json(Material)
///   credentials         — CredentialId utf8 bytes  → json(Credential)
///   transfers           — TransferId utf8 bytes    → json(Transfer)
///   issuer_permissions  — Address utf8 bytes       → json(IssuerPermission)
///   history             — MaterialId || be(seq)    → 32-byte digest
///   meta                — utf8 key bytes           → raw bytes (counters)
pub struct StateDb {
    _db: sled::Db,
    materials: sled::Tree,
    credentials: sled::Tree,
    transfers: sled::Tree,
    issuer_permissions: sled::Tree,
    history: sled::Tree,
    meta: sled::Tree,
}

impl StateDb {
    /// Open or create the state database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BioLedgerError> {
        let db = sled::open(path).map_err(|e| BioLedgerError::Storage(e.to_string()))?;
        let materials = db
            .open_tree("materials")
            .map_err(|e| BioLedgerError::Storage(e.to_string()))?;
        let credentials = db
            .open_tree("credentials")
            .map_err(|e| BioLedgerError::Storage(e.to_string()))?;
        let transfers = db
            .open_tree("transfers")
            .map_err(|e| BioLedgerError::Storage(e.to_string()))?;
        let issuer_permissions = db
            .open_tree("issuer_permissions")
            .map_err(|e| BioLedgerError::Storage(e.to_string()))?;
        let history = db
            .open_tree("history")
            .map_err(|e| BioLedgerError::Storage(e.to_string()))?;
        let meta = db
            .open_tree("meta")
            .map_err(|e| BioLedgerError::Storage(e.to_string()))?;
        Ok(Self {
            _db: db,
            materials,
            credentials,
            transfers,
            issuer_permissions,
            history,
            meta,
        })
    }

    /// Open a fresh temporary database (used by tests and single-run
    /// evaluation harness invocations where no on-disk persistence is
    /// required across processes).
    pub fn open_temp() -> Result<Self, BioLedgerError> {
        let dir = std::env::temp_dir().join(format!(
            "bioledger_{}_{}",
            std::process::id(),
            address_uniqueness_counter()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        Self::open(&dir)
    }

    // ── Materials ──────────────────────────────────────────────────────────

    pub fn get_material(&self, id: &MaterialId) -> Result<Option<Material>, BioLedgerError> {
        get_json(&self.materials, id.as_str().as_bytes())
    }

    pub fn put_material(&self, material: &Material) -> Result<(), BioLedgerError> {
        put_json(&self.materials, material.material_id.as_str().as_bytes(), material)
    }

    pub fn material_exists(&self, id: &MaterialId) -> bool {
        self.materials.contains_key(id.as_str().as_bytes()).unwrap_or(false)
    }

    pub fn count_materials(&self) -> u64 {
        self.materials.len() as u64
    }

    // ── Credentials ────────────────────────────────────────────────────────

    pub fn get_credential(&self, id: &CredentialId) -> Result<Option<Credential>, BioLedgerError> {
        get_json(&self.credentials, id.as_str().as_bytes())
    }

    pub fn put_credential(&self, credential: &Credential) -> Result<(), BioLedgerError> {
        put_json(
            &self.credentials,
            credential.credential_id.as_str().as_bytes(),
            credential,
        )
    }

    /// Credentials for a material, in insertion order (sled trees iterate in
    /// key order; credential keys are `cred:<n>` so insertion order and key
    /// order coincide because `n` is monotonically assigned).
    pub fn iter_credentials_for_material(
        &self,
        material_id: &MaterialId,
        ids: &[CredentialId],
    ) -> Result<Vec<Credential>, BioLedgerError> {
        let _ = material_id;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(c) = self.get_credential(id)? {
                out.push(c);
            }
        }
        Ok(out)
    }

    // ── Transfers ──────────────────────────────────────────────────────────

    pub fn get_transfer(&self, id: &TransferId) -> Result<Option<Transfer>, BioLedgerError> {
        get_json(&self.transfers, id.as_str().as_bytes())
    }

    pub fn put_transfer(&self, transfer: &Transfer) -> Result<(), BioLedgerError> {
        put_json(&self.transfers, transfer.transfer_id.as_str().as_bytes(), transfer)
    }

    pub fn iter_transfers_for_material(
        &self,
        ids: &[TransferId],
    ) -> Result<Vec<Transfer>, BioLedgerError> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(t) = self.get_transfer(id)? {
                out.push(t);
            }
        }
        Ok(out)
    }

    // ── Issuer permissions ─────────────────────────────────────────────────

    pub fn get_issuer_permission(
        &self,
        issuer: &Address,
    ) -> Result<Option<IssuerPermission>, BioLedgerError> {
        get_json(&self.issuer_permissions, issuer.as_str().as_bytes())
    }

    pub fn put_issuer_permission(&self, perm: &IssuerPermission) -> Result<(), BioLedgerError> {
        put_json(
            &self.issuer_permissions,
            perm.issuer_address.as_str().as_bytes(),
            perm,
        )
    }

    // ── History ────────────────────────────────────────────────────────────

    /// Append one 32-byte digest to `material_id`'s history. Never
    /// overwrites an existing sequence slot.
    pub fn append_history(
        &self,
        material_id: &MaterialId,
        digest: [u8; 32],
    ) -> Result<u64, BioLedgerError> {
        let seq = self.history_count(material_id)?;
        let key = history_key(material_id, seq);
        self.history
            .insert(key, &digest[..])
            .map_err(|e| BioLedgerError::Storage(e.to_string()))?;
        Ok(seq + 1)
    }

    pub fn history_count(&self, material_id: &MaterialId) -> Result<u64, BioLedgerError> {
        let prefix = history_prefix(material_id);
        self.history
            .scan_prefix(prefix)
            .count()
            .try_into()
            .map_err(|_| BioLedgerError::Other("history length overflow".into()))
    }

    pub fn history_at(
        &self,
        material_id: &MaterialId,
        index: u64,
    ) -> Result<Option<[u8; 32]>, BioLedgerError> {
        let key = history_key(material_id, index);
        match self
            .history
            .get(key)
            .map_err(|e| BioLedgerError::Storage(e.to_string()))?
        {
            Some(bytes) => {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                Ok(Some(arr))
            }
            None => Ok(None),
        }
    }

    pub fn history_slice(
        &self,
        material_id: &MaterialId,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<[u8; 32]>, BioLedgerError> {
        let prefix = history_prefix(material_id);
        let mut out = Vec::new();
        for item in self.history.scan_prefix(prefix).skip(offset as usize).take(limit as usize) {
            let (_, bytes) = item.map_err(|e| BioLedgerError::Storage(e.to_string()))?;
            let mut arr = [0u8; 32];
            arr.copy_from_slice(&bytes);
            out.push(arr);
        }
        Ok(out)
    }

    // ── Meta / counters ────────────────────────────────────────────────────

    pub fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), BioLedgerError> {
        self.meta
            .insert(key.as_bytes(), value)
            .map_err(|e| BioLedgerError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, BioLedgerError> {
        self.meta
            .get(key.as_bytes())
            .map(|v| v.map(|iv| iv.to_vec()))
            .map_err(|e| BioLedgerError::Storage(e.to_string()))
    }

    /// Allocate the next sequential counter value for `counter_name`,
    /// persisted so minted IDs stay monotone across process restarts
    /// against the same database.
    pub fn next_counter(&self, counter_name: &str) -> Result<u64, BioLedgerError> {
        let current = self
            .get_meta(counter_name)?
            .map(|b| {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&b[..8]);
                u64::from_be_bytes(arr)
            })
            .unwrap_or(1);
        self.put_meta(counter_name, &(current + 1).to_be_bytes())?;
        Ok(current)
    }

    pub fn next_block_height(&self) -> Result<u64, BioLedgerError> {
        self.next_counter("block_height")
    }

    pub fn flush(&self) -> Result<(), BioLedgerError> {
        self._db.flush().map_err(|e| BioLedgerError::Storage(e.to_string()))?;
        Ok(())
    }
}

fn history_prefix(material_id: &MaterialId) -> Vec<u8> {
    let mut key = material_id.as_str().as_bytes().to_vec();
    key.push(0); // separator: material IDs never contain a NUL byte
    key
}

fn history_key(material_id: &MaterialId, seq: u64) -> Vec<u8> {
    let mut key = history_prefix(material_id);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

fn get_json<T: serde::de::DeserializeOwned>(
    tree: &sled::Tree,
    key: &[u8],
) -> Result<Option<T>, BioLedgerError> {
    match tree.get(key).map_err(|e| BioLedgerError::Storage(e.to_string()))? {
        Some(bytes) => {
            let value = serde_json::from_slice(&bytes)
                .map_err(|e| BioLedgerError::Serialization(e.to_string()))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn put_json<T: serde::Serialize>(
    tree: &sled::Tree,
    key: &[u8],
    value: &T,
) -> Result<(), BioLedgerError> {
    let bytes = serde_json::to_vec(value).map_err(|e| BioLedgerError::Serialization(e.to_string()))?;
    tree.insert(key, bytes).map_err(|e| BioLedgerError::Storage(e.to_string()))?;
    Ok(())
}

fn address_uniqueness_counter() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}
