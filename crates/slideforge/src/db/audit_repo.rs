//! Audit event repository.
//!
//! Append-only record of every source status change: who moved it, from what
//! to what, and why. This is what makes generated output traceable back to an
//! approval decision.

use rusqlite::{params, Connection, Row};

use super::{Database, DatabaseError};

/// One recorded status change.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub id: i64,
    pub source_id: String,
    pub actor: String,
    pub old_status: String,
    pub new_status: String,
    pub reason: Option<String>,
    pub created_at: String,
}

impl AuditEvent {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            source_id: row.get("source_id")?,
            actor: row.get("actor")?,
            old_status: row.get("old_status")?,
            new_status: row.get("new_status")?,
            reason: row.get("reason")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Appends an audit event.
pub fn record(
    db: &Database,
    source_id: &str,
    actor: &str,
    old_status: &str,
    new_status: &str,
    reason: Option<&str>,
    created_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| record_on(conn, source_id, actor, old_status, new_status, reason, created_at))
}

/// Connection-level variant of [`record`], for callers that append the event
/// inside a wider transaction.
pub(crate) fn record_on(
    conn: &Connection,
    source_id: &str,
    actor: &str,
    old_status: &str,
    new_status: &str,
    reason: Option<&str>,
    created_at: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO audit_events (source_id, actor, old_status, new_status, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![source_id, actor, old_status, new_status, reason, created_at],
    )?;
    Ok(())
}

/// Lists a source's audit trail, oldest first.
pub fn list_for_source(db: &Database, source_id: &str) -> Result<Vec<AuditEvent>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM audit_events WHERE source_id = ?1 ORDER BY id ASC",
        )?;
        let rows: Vec<AuditEvent> = stmt
            .query_map(params![source_id], AuditEvent::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
