//! The registry state machine (C3).
//!
//! Owns all mutable state. Every mutating operation is serialized through
//! `write_lock`: callers validate everything up front, stage the resulting
//! writes, and only commit once every precondition for the whole call has
//! passed — there is no partial mutation on failure. Reads bypass the lock
//! entirely and hit `StateDb` directly, so readers never block on a writer
//! and vice versa.
//!
//! Note on history: only material-scoped operations append a history entry
//! (C6 is defined per material). `authorize_issuer`/`revoke_issuer` have no
//! associated material and so do not append to any history log.

use std::sync::Mutex;

use bioledger_core::error::BioLedgerError;
use bioledger_core::model::{
    Credential, CredentialType, EventTag, IssuerPermission, Material, MaterialStatus,
    MaterialType, Transfer,
};
use bioledger_core::types::{Address, CredentialId, MaterialId, Receipt, Timestamp, TransferId};
use bioledger_crypto::canonical;
use serde_json::json;
use tracing::{info, warn};

use crate::db::StateDb;
use crate::history;

fn is_zero(digest: &[u8; 32]) -> bool {
    digest.iter().all(|b| *b == 0)
}

/// The registry handle. Construction takes ownership of a `StateDb` and an
/// admin identity; there is no module-level mutable state anywhere in this
/// crate — everything reachable from state lives behind this one struct.
pub struct Registry {
    db: StateDb,
    write_lock: Mutex<()>,
    admin: Address,
}

impl Registry {
    pub fn new(db: StateDb, admin: Address) -> Self {
        Self {
            db,
            write_lock: Mutex::new(()),
            admin,
        }
    }

    pub fn admin(&self) -> &Address {
        &self.admin
    }

    fn next_receipt(&self, op: &str, logs: Vec<String>) -> Result<Receipt, BioLedgerError> {
        let block_height = self.db.next_block_height()?;
        let tx_id = hex::encode(canonical::sha256(format!("{op}:{block_height}").as_bytes()));
        Ok(Receipt {
            tx_id,
            block_height,
            logs,
        })
    }

    // ── Issuer administration ────────────────────────────────────────────────

    pub fn authorize_issuer(
        &self,
        caller: &Address,
        issuer: &Address,
        can_identity: bool,
        can_qc: bool,
        can_usage: bool,
    ) -> Result<Receipt, BioLedgerError> {
        let _guard = self.write_lock.lock().unwrap();
        if caller != &self.admin {
            return Err(BioLedgerError::NotAdmin);
        }
        let mut perm = self
            .db
            .get_issuer_permission(issuer)?
            .unwrap_or_else(|| IssuerPermission::new(issuer.clone()));
        perm.is_approved = true;
        perm.can_issue_identity = can_identity;
        perm.can_issue_qc = can_qc;
        perm.can_issue_usage_rights = can_usage;
        perm.revoked_at = 0;
        self.db.put_issuer_permission(&perm)?;

        info!(issuer = %issuer, "issuer authorized");
        self.next_receipt("authorize_issuer", vec![format!("issuer {issuer} authorized")])
    }

    pub fn revoke_issuer(&self, caller: &Address, issuer: &Address, now: Timestamp) -> Result<Receipt, BioLedgerError> {
        let _guard = self.write_lock.lock().unwrap();
        if caller != &self.admin {
            return Err(BioLedgerError::NotAdmin);
        }
        let mut perm = self
            .db
            .get_issuer_permission(issuer)?
            .unwrap_or_else(|| IssuerPermission::new(issuer.clone()));
        perm.revoked_at = now;
        perm.is_approved = false;
        self.db.put_issuer_permission(&perm)?;

        warn!(issuer = %issuer, "issuer revoked");
        self.next_receipt("revoke_issuer", vec![format!("issuer {issuer} revoked at {now}")])
    }

    // ── Materials ─────────────────────────────────────────────────────────────

    pub fn register_material(
        &self,
        caller: &Address,
        material_type: MaterialType,
        metadata_hash: [u8; 32],
        owner_org: String,
        now: Timestamp,
    ) -> Result<(MaterialId, Receipt), BioLedgerError> {
        let _guard = self.write_lock.lock().unwrap();
        if is_zero(&metadata_hash) {
            return Err(BioLedgerError::InvalidCommitmentHash);
        }

        let n = self.db.next_counter("materials")?;
        let material_id = MaterialId::mint(material_type, n);
        let material = Material {
            material_id: material_id.clone(),
            material_type,
            metadata_hash,
            owner_address: caller.clone(),
            owner_org,
            status: MaterialStatus::Active,
            created_at: now,
            updated_at: now,
            transfers: vec![],
            credentials: vec![],
        };
        self.db.put_material(&material)?;
        history::record(
            &self.db,
            &material_id,
            EventTag::MaterialRegistered,
            caller,
            json!({"material_type": material_type}),
            now,
        )?;

        info!(material_id = %material_id, "material registered");
        let receipt = self.next_receipt(
            "register_material",
            vec![format!("material {material_id} registered")],
        )?;
        Ok((material_id, receipt))
    }

    pub fn get_material(&self, material_id: &MaterialId) -> Result<Option<Material>, BioLedgerError> {
        self.db.get_material(material_id)
    }

    // ── Credentials ───────────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub fn issue_credential(
        &self,
        caller: &Address,
        material_id: &MaterialId,
        credential_type: CredentialType,
        commitment_hash: [u8; 32],
        valid_until: Timestamp,
        artifact_cid: String,
        artifact_hash: [u8; 32],
        issuer_org: String,
        now: Timestamp,
    ) -> Result<(CredentialId, Receipt), BioLedgerError> {
        let _guard = self.write_lock.lock().unwrap();

        let perm = self
            .db
            .get_issuer_permission(caller)?
            .filter(|p| p.is_approved)
            .ok_or(BioLedgerError::NotApprovedIssuer)?;
        if perm.is_revoked() {
            return Err(BioLedgerError::IssuerRevoked);
        }
        if !perm.can_issue(credential_type) {
            return Err(BioLedgerError::NotAuthorizedForCredentialType);
        }
        let mut material = self
            .db
            .get_material(material_id)?
            .ok_or_else(|| BioLedgerError::MaterialNotFound(material_id.to_string()))?;
        if is_zero(&commitment_hash) {
            return Err(BioLedgerError::InvalidCommitmentHash);
        }
        if is_zero(&artifact_hash) {
            return Err(BioLedgerError::InvalidArtifactHash);
        }
        if valid_until != 0 && valid_until <= now {
            return Err(BioLedgerError::InvalidValidUntil);
        }

        let n = self.db.next_counter("credentials")?;
        let credential_id = CredentialId::mint(n);
        let credential = Credential {
            credential_id: credential_id.clone(),
            material_id: material_id.clone(),
            credential_type,
            commitment_hash,
            issuer_address: caller.clone(),
            issuer_org,
            issued_at: now,
            valid_until,
            artifact_cid,
            artifact_hash,
            revoked: false,
        };
        self.db.put_credential(&credential)?;
        material.credentials.push(credential_id.clone());
        self.db.put_material(&material)?;
        history::record(
            &self.db,
            material_id,
            EventTag::CredentialIssued,
            caller,
            json!({"credential_id": credential_id.to_string(), "credential_type": credential_type}),
            now,
        )?;

        info!(credential_id = %credential_id, material_id = %material_id, "credential issued");
        let receipt = self.next_receipt(
            "issue_credential",
            vec![format!("credential {credential_id} issued for {material_id}")],
        )?;
        Ok((credential_id, receipt))
    }

    pub fn revoke_credential(
        &self,
        caller: &Address,
        credential_id: &CredentialId,
        now: Timestamp,
    ) -> Result<Receipt, BioLedgerError> {
        let _guard = self.write_lock.lock().unwrap();

        let mut credential = self
            .db
            .get_credential(credential_id)?
            .ok_or_else(|| BioLedgerError::CredentialNotFound(credential_id.to_string()))?;
        if caller != &credential.issuer_address && caller != &self.admin {
            return Err(BioLedgerError::NotAuthorizedToRevoke);
        }
        if credential.revoked {
            return Err(BioLedgerError::CredentialAlreadyRevoked(credential_id.to_string()));
        }
        credential.revoked = true;
        let material_id = credential.material_id.clone();
        self.db.put_credential(&credential)?;
        history::record(
            &self.db,
            &material_id,
            EventTag::CredentialRevoked,
            caller,
            json!({"credential_id": credential_id.to_string()}),
            now,
        )?;

        warn!(credential_id = %credential_id, "credential revoked");
        self.next_receipt(
            "revoke_credential",
            vec![format!("credential {credential_id} revoked")],
        )
    }

    pub fn get_credentials(&self, material_id: &MaterialId) -> Result<Vec<Credential>, BioLedgerError> {
        let material = self
            .db
            .get_material(material_id)?
            .ok_or_else(|| BioLedgerError::MaterialNotFound(material_id.to_string()))?;
        self.db.iter_credentials_for_material(material_id, &material.credentials)
    }

    // ── Status transitions ───────────────────────────────────────────────────

    pub fn set_status_by_owner(
        &self,
        caller: &Address,
        material_id: &MaterialId,
        new_status: MaterialStatus,
        reason_hash: [u8; 32],
        now: Timestamp,
    ) -> Result<Receipt, BioLedgerError> {
        let _guard = self.write_lock.lock().unwrap();

        let mut material = self
            .db
            .get_material(material_id)?
            .ok_or_else(|| BioLedgerError::MaterialNotFound(material_id.to_string()))?;
        if caller != &material.owner_address {
            return Err(BioLedgerError::NotOwner);
        }
        if matches!(new_status, MaterialStatus::Revoked) {
            return Err(BioLedgerError::NotAuthorizedForStatus);
        }
        if matches!(material.status, MaterialStatus::Revoked) {
            return Err(BioLedgerError::MaterialRevokedTerminal);
        }
        if is_zero(&reason_hash) {
            return Err(BioLedgerError::InvalidReasonHash);
        }

        material.status = new_status;
        material.updated_at = now;
        self.db.put_material(&material)?;
        history::record(
            &self.db,
            material_id,
            EventTag::StatusChangedByOwner,
            caller,
            json!({"new_status": new_status}),
            now,
        )?;

        info!(material_id = %material_id, ?new_status, "status changed by owner");
        self.next_receipt(
            "set_status_by_owner",
            vec![format!("material {material_id} status -> {new_status:?}")],
        )
    }

    /// `caller` must be the registry admin, or a currently-approved,
    /// non-revoked, QC-capable issuer.
    pub fn set_status_by_authority(
        &self,
        caller: &Address,
        material_id: &MaterialId,
        new_status: MaterialStatus,
        reason_hash: [u8; 32],
        now: Timestamp,
    ) -> Result<Receipt, BioLedgerError> {
        let _guard = self.write_lock.lock().unwrap();

        let is_admin = caller == &self.admin;
        let is_qc_authority = self
            .db
            .get_issuer_permission(caller)?
            .map(|p| p.is_approved && !p.is_revoked() && p.can_issue_qc)
            .unwrap_or(false);
        if !is_admin && !is_qc_authority {
            return Err(BioLedgerError::NotAuthorizedForStatus);
        }

        let mut material = self
            .db
            .get_material(material_id)?
            .ok_or_else(|| BioLedgerError::MaterialNotFound(material_id.to_string()))?;
        if matches!(material.status, MaterialStatus::Revoked) {
            return Err(BioLedgerError::MaterialRevokedTerminal);
        }
        if is_zero(&reason_hash) {
            return Err(BioLedgerError::InvalidReasonHash);
        }

        material.status = new_status;
        material.updated_at = now;
        self.db.put_material(&material)?;
        history::record(
            &self.db,
            material_id,
            EventTag::StatusChangedByAuthority,
            caller,
            json!({"new_status": new_status}),
            now,
        )?;

        info!(material_id = %material_id, ?new_status, "status changed by authority");
        self.next_receipt(
            "set_status_by_authority",
            vec![format!("material {material_id} status -> {new_status:?}")],
        )
    }

    // ── Transfers ─────────────────────────────────────────────────────────────

    pub fn initiate_transfer(
        &self,
        caller: &Address,
        material_id: &MaterialId,
        to_address: Address,
        to_org: String,
        shipment_hash: [u8; 32],
        now: Timestamp,
    ) -> Result<(TransferId, Receipt), BioLedgerError> {
        let _guard = self.write_lock.lock().unwrap();

        let mut material = self
            .db
            .get_material(material_id)?
            .ok_or_else(|| BioLedgerError::MaterialNotFound(material_id.to_string()))?;
        if caller != &material.owner_address {
            return Err(BioLedgerError::NotOwner);
        }
        if !matches!(material.status, MaterialStatus::Active) {
            return Err(BioLedgerError::MaterialNotActive);
        }
        if is_zero(&shipment_hash) {
            return Err(BioLedgerError::InvalidShipmentHash);
        }
        if let Some(last_id) = material.transfers.last() {
            let last = self
                .db
                .get_transfer(last_id)?
                .ok_or_else(|| BioLedgerError::TransferNotFound(last_id.to_string()))?;
            if !last.accepted {
                return Err(BioLedgerError::PendingTransferExists);
            }
        }

        let n = self.db.next_counter("transfers")?;
        let transfer_id = TransferId::mint(n);
        let transfer = Transfer {
            transfer_id: transfer_id.clone(),
            material_id: material_id.clone(),
            from_address: caller.clone(),
            from_org: material.owner_org.clone(),
            to_address,
            to_org,
            shipment_hash,
            timestamp: now,
            accepted: false,
        };
        self.db.put_transfer(&transfer)?;
        material.transfers.push(transfer_id.clone());
        self.db.put_material(&material)?;
        history::record(
            &self.db,
            material_id,
            EventTag::TransferInitiated,
            caller,
            json!({"transfer_id": transfer_id.to_string()}),
            now,
        )?;

        info!(transfer_id = %transfer_id, material_id = %material_id, "transfer initiated");
        let receipt = self.next_receipt(
            "initiate_transfer",
            vec![format!("transfer {transfer_id} initiated for {material_id}")],
        )?;
        Ok((transfer_id, receipt))
    }

    pub fn accept_transfer(
        &self,
        caller: &Address,
        material_id: &MaterialId,
        now: Timestamp,
    ) -> Result<Receipt, BioLedgerError> {
        let _guard = self.write_lock.lock().unwrap();

        let mut material = self
            .db
            .get_material(material_id)?
            .ok_or_else(|| BioLedgerError::MaterialNotFound(material_id.to_string()))?;
        let transfer_id = material
            .transfers
            .last()
            .cloned()
            .ok_or(BioLedgerError::NoPendingTransfer)?;
        let mut transfer = self
            .db
            .get_transfer(&transfer_id)?
            .ok_or_else(|| BioLedgerError::TransferNotFound(transfer_id.to_string()))?;
        if transfer.accepted {
            return Err(BioLedgerError::NoPendingTransfer);
        }
        if caller != &transfer.to_address {
            return Err(BioLedgerError::NotTransferRecipient);
        }

        transfer.accepted = true;
        self.db.put_transfer(&transfer)?;
        material.owner_address = transfer.to_address.clone();
        material.owner_org = transfer.to_org.clone();
        material.updated_at = now;
        self.db.put_material(&material)?;
        history::record(
            &self.db,
            material_id,
            EventTag::TransferAccepted,
            caller,
            json!({"transfer_id": transfer_id.to_string()}),
            now,
        )?;

        info!(transfer_id = %transfer_id, material_id = %material_id, "transfer accepted");
        self.next_receipt(
            "accept_transfer",
            vec![format!("transfer {transfer_id} accepted for {material_id}")],
        )
    }

    pub fn get_transfers(&self, material_id: &MaterialId) -> Result<Vec<Transfer>, BioLedgerError> {
        let material = self
            .db
            .get_material(material_id)?
            .ok_or_else(|| BioLedgerError::MaterialNotFound(material_id.to_string()))?;
        self.db.iter_transfers_for_material(&material.transfers)
    }

    // ── History reads ─────────────────────────────────────────────────────────

    pub fn get_history_count(&self, material_id: &MaterialId) -> Result<u64, BioLedgerError> {
        history::count(&self.db, material_id)
    }

    pub fn get_history_at(&self, material_id: &MaterialId, index: u64) -> Result<Option<[u8; 32]>, BioLedgerError> {
        history::at(&self.db, material_id, index)
    }

    pub fn get_history_slice(
        &self,
        material_id: &MaterialId,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<[u8; 32]>, BioLedgerError> {
        history::slice(&self.db, material_id, offset, limit)
    }

    pub fn get_issuer_permission(&self, issuer: &Address) -> Result<Option<IssuerPermission>, BioLedgerError> {
        self.db.get_issuer_permission(issuer)
    }
}
