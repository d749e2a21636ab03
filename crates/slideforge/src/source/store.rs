//! Source store: creation and read access for uploaded sources.

use chrono::Utc;

use crate::db::source_repo::{self, ApprovedFilter, SourceRow, TransitionFields};
use crate::db::{audit_repo, Database, DatabaseError};
use crate::error::ApprovalError;
use crate::source::SourceStatus;

/// A source with its status decoded into the typed state machine.
#[derive(Debug, Clone)]
pub struct Source {
    pub id: String,
    pub owner: String,
    pub filename: String,
    pub file_path: String,
    pub byte_size: u64,
    pub title: Option<String>,
    pub industry: Option<String>,
    pub tags: Vec<String>,
    pub status: SourceStatus,
    pub approved_by: Option<String>,
    pub approval_notes: Option<String>,
    pub approved_at: Option<String>,
    pub rejection_reason: Option<String>,
    pub error: Option<String>,
    pub deleted: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Source {
    pub(crate) fn from_row(row: SourceRow) -> Result<Self, DatabaseError> {
        let status = row.parsed_status()?;
        let tags = match &row.tags {
            None => Vec::new(),
            Some(json) => serde_json::from_str(json).map_err(|_| DatabaseError::CorruptValue {
                column: "tags",
                value: json.clone(),
            })?,
        };
        Ok(Self {
            id: row.id,
            owner: row.owner,
            filename: row.filename,
            file_path: row.file_path,
            byte_size: row.byte_size,
            title: row.title,
            industry: row.industry,
            tags,
            status,
            approved_by: row.approved_by,
            approval_notes: row.approval_notes,
            approved_at: row.approved_at,
            rejection_reason: row.rejection_reason,
            error: row.error,
            deleted: row.deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Metadata delivered by the file-ingestion collaborator for a new upload.
#[derive(Debug, Clone)]
pub struct NewSource {
    pub owner: String,
    pub filename: String,
    /// Where ingestion stored the raw bytes.
    pub file_path: String,
    pub byte_size: u64,
    pub title: Option<String>,
    pub industry: Option<String>,
    pub tags: Vec<String>,
}

/// Read and create access for sources. Status mutation lives exclusively in
/// [`crate::source::ApprovalGate`].
#[derive(Clone)]
pub struct SourceStore {
    db: Database,
}

impl SourceStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Registers an upload. The source starts `pending` and the creation is
    /// audit-logged under the uploading owner.
    pub fn create(&self, new: NewSource) -> Result<Source, ApprovalError> {
        let now = Utc::now().to_rfc3339();
        let id = uuid::Uuid::new_v4().to_string();
        let mime = mime_guess::from_path(&new.filename).first_raw();

        let row = SourceRow {
            id: id.clone(),
            owner: new.owner.clone(),
            filename: new.filename,
            file_path: new.file_path,
            byte_size: new.byte_size,
            title: new.title,
            industry: new.industry,
            tags: if new.tags.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&new.tags).unwrap_or_default())
            },
            status: SourceStatus::Pending.as_str().to_string(),
            approved_by: None,
            approval_notes: None,
            approved_at: None,
            rejection_reason: None,
            error: None,
            deleted: false,
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        source_repo::insert(&self.db, &row)?;
        audit_repo::record(&self.db, &id, &new.owner, "", "pending", None, &now)?;

        log::info!(
            "Registered source {} ({}, {} bytes, mime {:?})",
            id,
            row.filename,
            row.byte_size,
            mime
        );

        Source::from_row(row).map_err(ApprovalError::from)
    }

    /// Fetches a source by ID.
    pub fn get(&self, id: &str) -> Result<Source, ApprovalError> {
        let row = source_repo::find_by_id(&self.db, id)?
            .ok_or_else(|| ApprovalError::SourceNotFound(id.to_string()))?;
        Source::from_row(row).map_err(ApprovalError::from)
    }

    /// Lists non-deleted sources with the given status.
    pub fn list_by_status(&self, status: SourceStatus) -> Result<Vec<Source>, ApprovalError> {
        source_repo::list_by_status(&self.db, status)?
            .into_iter()
            .map(|r| Source::from_row(r).map_err(ApprovalError::from))
            .collect()
    }

    /// Lists approved sources, optionally filtered by industry or tag.
    pub fn list_approved(&self, filter: &ApprovedFilter) -> Result<Vec<Source>, ApprovalError> {
        source_repo::list_approved(&self.db, filter)?
            .into_iter()
            .map(|r| Source::from_row(r).map_err(ApprovalError::from))
            .collect()
    }

    /// Administrative soft delete. Orthogonal to status: the row and its
    /// slides stay on disk, but every listing and the matcher's index view
    /// skip it from this point on.
    pub fn soft_delete(&self, id: &str, actor: &str) -> Result<(), ApprovalError> {
        let source = self.get(id)?;
        let now = Utc::now().to_rfc3339();
        if !source_repo::soft_delete(&self.db, id, &now)? {
            return Err(ApprovalError::SourceNotFound(id.to_string()));
        }
        audit_repo::record(
            &self.db,
            id,
            actor,
            source.status.as_str(),
            source.status.as_str(),
            Some("soft-deleted"),
            &now,
        )?;
        log::info!("Source {} soft-deleted by {}", id, actor);
        Ok(())
    }

    /// A source's full audit trail, oldest first.
    pub fn audit_trail(&self, id: &str) -> Result<Vec<crate::db::audit_repo::AuditEvent>, ApprovalError> {
        Ok(audit_repo::list_for_source(&self.db, id)?)
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }
}

// Shared with the gate: one conditional UPDATE plus its audit record. Both
// statements commit in a single transaction, so a transition can never land
// without its trail entry.
pub(crate) fn apply_transition(
    db: &Database,
    source: &Source,
    next: SourceStatus,
    actor: &str,
    reason: Option<&str>,
    fields: TransitionFields,
) -> Result<bool, ApprovalError> {
    let now = Utc::now().to_rfc3339();
    let applied = db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        let applied =
            source_repo::transition_on(&tx, &source.id, source.status, next, &fields, &now)?;
        if applied {
            audit_repo::record_on(
                &tx,
                &source.id,
                actor,
                source.status.as_str(),
                next.as_str(),
                reason,
                &now,
            )?;
        }
        tx.commit()?;
        Ok(applied)
    })?;
    Ok(applied)
}
