//! Approval gate: the single authority for source status mutation.
//!
//! Every transition is checked against the typed edge table first, then
//! applied as a conditional UPDATE keyed on the expected status. If a
//! concurrent writer got there first the UPDATE affects zero rows and the
//! caller gets `InvalidTransition`: per-source transitions are linearizable.

use chrono::Utc;

use crate::db::source_repo::TransitionFields;
use crate::db::Database;
use crate::error::ApprovalError;
use crate::source::store::{apply_transition, Source, SourceStore};
use crate::source::SourceStatus;

#[derive(Clone)]
pub struct ApprovalGate {
    store: SourceStore,
}

impl ApprovalGate {
    pub fn new(db: Database) -> Self {
        Self {
            store: SourceStore::new(db),
        }
    }

    pub fn with_store(store: SourceStore) -> Self {
        Self { store }
    }

    /// Automatic `pending -> processing` transition when extraction begins.
    pub fn begin_processing(&self, id: &str) -> Result<Source, ApprovalError> {
        self.transition(id, SourceStatus::Processing, "system", None, TransitionFields::default())
    }

    /// Explicit approver action: `processing -> approved`.
    pub fn approve(
        &self,
        id: &str,
        actor: &str,
        notes: Option<&str>,
    ) -> Result<Source, ApprovalError> {
        let now = Utc::now().to_rfc3339();
        let fields = TransitionFields {
            approved_by: Some(actor.to_string()),
            approval_notes: notes.map(|n| n.to_string()),
            approved_at: Some(now),
            ..Default::default()
        };
        let source = self.transition(id, SourceStatus::Approved, actor, notes, fields)?;
        log::info!("Source {} approved by {}", id, actor);
        Ok(source)
    }

    /// Explicit approver action: `processing -> rejected`. The reason is
    /// mandatory and becomes part of the audit trail.
    pub fn reject(&self, id: &str, actor: &str, reason: &str) -> Result<Source, ApprovalError> {
        if reason.trim().is_empty() {
            return Err(ApprovalError::MissingReason);
        }
        let fields = TransitionFields {
            rejection_reason: Some(reason.to_string()),
            ..Default::default()
        };
        let source = self.transition(id, SourceStatus::Rejected, actor, Some(reason), fields)?;
        log::info!("Source {} rejected by {}: {}", id, actor, reason);
        Ok(source)
    }

    /// Automatic transition on extraction or validation error. The error
    /// detail is retained on the row.
    pub fn mark_failed(&self, id: &str, error: &str) -> Result<Source, ApprovalError> {
        let fields = TransitionFields {
            error: Some(error.to_string()),
            ..Default::default()
        };
        let source = self.transition(id, SourceStatus::Failed, "system", Some(error), fields)?;
        log::warn!("Source {} failed: {}", id, error);
        Ok(source)
    }

    fn transition(
        &self,
        id: &str,
        next: SourceStatus,
        actor: &str,
        reason: Option<&str>,
        fields: TransitionFields,
    ) -> Result<Source, ApprovalError> {
        let source = self.store.get(id)?;

        if !source.status.can_transition_to(next) {
            return Err(ApprovalError::InvalidTransition {
                from: source.status,
                to: next,
            });
        }

        let applied = apply_transition(self.store.db(), &source, next, actor, reason, fields)?;
        if !applied {
            // Lost the race: someone else moved the source first.
            let current = self.store.get(id)?;
            return Err(ApprovalError::InvalidTransition {
                from: current.status,
                to: next,
            });
        }

        self.store.get(id)
    }
}
