//! Source repository: CRUD operations for the `sources` table.
//!
//! Status is stored as text; the typed state machine lives in
//! `crate::source::SourceStatus`. The conditional `transition` UPDATE is the
//! only way a status cell changes, which makes transitions linearizable
//! per-source: of two concurrent writers, exactly one matches the expected
//! status and the other sees zero affected rows.

use rusqlite::{params, Connection, Row};

use crate::source::SourceStatus;

use super::{Database, DatabaseError};

/// A raw source row from the database.
#[derive(Debug, Clone)]
pub struct SourceRow {
    pub id: String,
    pub owner: String,
    pub filename: String,
    pub file_path: String,
    pub byte_size: u64,
    pub title: Option<String>,
    pub industry: Option<String>,
    /// JSON array of tag strings.
    pub tags: Option<String>,
    pub status: String,
    pub approved_by: Option<String>,
    pub approval_notes: Option<String>,
    pub approved_at: Option<String>,
    pub rejection_reason: Option<String>,
    pub error: Option<String>,
    pub deleted: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl SourceRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            owner: row.get("owner")?,
            filename: row.get("filename")?,
            file_path: row.get("file_path")?,
            byte_size: row.get::<_, i64>("byte_size")? as u64,
            title: row.get("title")?,
            industry: row.get("industry")?,
            tags: row.get("tags")?,
            status: row.get("status")?,
            approved_by: row.get("approved_by")?,
            approval_notes: row.get("approval_notes")?,
            approved_at: row.get("approved_at")?,
            rejection_reason: row.get("rejection_reason")?,
            error: row.get("error")?,
            deleted: row.get::<_, i64>("deleted")? != 0,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Typed view of the status column.
    pub fn parsed_status(&self) -> Result<SourceStatus, DatabaseError> {
        SourceStatus::parse(&self.status).ok_or_else(|| DatabaseError::CorruptValue {
            column: "status",
            value: self.status.clone(),
        })
    }
}

/// Column updates carried by a status transition.
#[derive(Debug, Default, Clone)]
pub struct TransitionFields {
    pub approved_by: Option<String>,
    pub approval_notes: Option<String>,
    pub approved_at: Option<String>,
    pub rejection_reason: Option<String>,
    pub error: Option<String>,
}

/// Filter for approved-source listings.
#[derive(Debug, Default, Clone)]
pub struct ApprovedFilter {
    pub industry: Option<String>,
    pub tag: Option<String>,
    pub limit: Option<u64>,
}

/// Inserts a new source row.
pub fn insert(db: &Database, source: &SourceRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO sources (id, owner, filename, file_path, byte_size, title, industry,
             tags, status, approved_by, approval_notes, approved_at, rejection_reason, error,
             deleted, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                source.id,
                source.owner,
                source.filename,
                source.file_path,
                source.byte_size as i64,
                source.title,
                source.industry,
                source.tags,
                source.status,
                source.approved_by,
                source.approval_notes,
                source.approved_at,
                source.rejection_reason,
                source.error,
                source.deleted as i64,
                source.created_at,
                source.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a source by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<SourceRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM sources WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], SourceRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists non-deleted sources with the given status, newest first.
pub fn list_by_status(db: &Database, status: SourceStatus) -> Result<Vec<SourceRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM sources WHERE status = ?1 AND deleted = 0 ORDER BY created_at DESC",
        )?;
        let rows: Vec<SourceRow> = stmt
            .query_map(params![status.as_str()], SourceRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Lists approved, non-deleted sources with optional industry/tag filters.
///
/// This is the only listing the content matcher is allowed to build on.
pub fn list_approved(db: &Database, filter: &ApprovedFilter) -> Result<Vec<SourceRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = vec!["status = 'approved'".to_string(), "deleted = 0".to_string()];
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref industry) = filter.industry {
            conditions.push(format!("industry = ?{}", param_values.len() + 1));
            param_values.push(Box::new(industry.clone()));
        }
        if let Some(ref tag) = filter.tag {
            // tags column holds a JSON array; match the quoted element.
            conditions.push(format!("tags LIKE ?{}", param_values.len() + 1));
            param_values.push(Box::new(format!("%\"{}\"%", tag)));
        }

        let limit = filter.limit.unwrap_or(100) as i64;
        param_values.push(Box::new(limit));
        let sql = format!(
            "SELECT * FROM sources WHERE {} ORDER BY approved_at DESC LIMIT ?{}",
            conditions.join(" AND "),
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows: Vec<SourceRow> = stmt
            .query_map(params_ref.as_slice(), SourceRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Approved, non-deleted sources that still have untrained content: either no
/// extracted slides at all, or at least one slide without an embedding.
pub fn list_needing_training(db: &Database) -> Result<Vec<SourceRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT s.* FROM sources s
             WHERE s.status = 'approved' AND s.deleted = 0
               AND (NOT EXISTS (SELECT 1 FROM slides sl WHERE sl.source_id = s.id)
                    OR EXISTS (SELECT 1 FROM slides sl
                               WHERE sl.source_id = s.id AND sl.embedding IS NULL))
             ORDER BY s.approved_at ASC",
        )?;
        let rows: Vec<SourceRow> = stmt
            .query_map([], SourceRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Applies a status transition as a single conditional UPDATE.
///
/// Returns `true` when the row was updated, `false` when the current status
/// no longer matched `expected` (lost race or illegal transition). Never
/// touches soft-deleted rows.
pub fn transition(
    db: &Database,
    id: &str,
    expected: SourceStatus,
    next: SourceStatus,
    fields: &TransitionFields,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| transition_on(conn, id, expected, next, fields, updated_at))
}

/// Connection-level variant of [`transition`], for callers that bundle the
/// UPDATE with further statements in one transaction.
pub(crate) fn transition_on(
    conn: &Connection,
    id: &str,
    expected: SourceStatus,
    next: SourceStatus,
    fields: &TransitionFields,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    let affected = conn.execute(
        "UPDATE sources SET status = ?3, updated_at = ?4,
         approved_by = COALESCE(?5, approved_by),
         approval_notes = COALESCE(?6, approval_notes),
         approved_at = COALESCE(?7, approved_at),
         rejection_reason = COALESCE(?8, rejection_reason),
         error = COALESCE(?9, error)
         WHERE id = ?1 AND status = ?2 AND deleted = 0",
        params![
            id,
            expected.as_str(),
            next.as_str(),
            updated_at,
            fields.approved_by,
            fields.approval_notes,
            fields.approved_at,
            fields.rejection_reason,
            fields.error,
        ],
    )?;
    Ok(affected == 1)
}

/// Flags a source as soft-deleted. Status is left untouched; slides remain
/// until the row is physically removed by an administrator.
pub fn soft_delete(db: &Database, id: &str, updated_at: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE sources SET deleted = 1, updated_at = ?2 WHERE id = ?1 AND deleted = 0",
            params![id, updated_at],
        )?;
        Ok(affected == 1)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    pub(crate) fn sample_source(id: &str) -> SourceRow {
        SourceRow {
            id: id.to_string(),
            owner: "alice".to_string(),
            filename: "pitch.pptx".to_string(),
            file_path: "/tmp/pitch.pptx".to_string(),
            byte_size: 4096,
            title: Some("Q3 Pitch".to_string()),
            industry: Some("fintech".to_string()),
            tags: Some(r#"["pitch","sales"]"#.to_string()),
            status: "pending".to_string(),
            approved_by: None,
            approval_notes: None,
            approved_at: None,
            rejection_reason: None,
            error: None,
            deleted: false,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        insert(&db, &sample_source("src-1")).unwrap();

        let found = find_by_id(&db, "src-1").unwrap().unwrap();
        assert_eq!(found.filename, "pitch.pptx");
        assert_eq!(found.parsed_status().unwrap(), SourceStatus::Pending);
        assert_eq!(found.industry.as_deref(), Some("fintech"));
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, "nope").unwrap().is_none());
    }

    #[test]
    fn test_transition_applies_once() {
        let db = test_db();
        insert(&db, &sample_source("src-2")).unwrap();

        let applied = transition(
            &db,
            "src-2",
            SourceStatus::Pending,
            SourceStatus::Processing,
            &TransitionFields::default(),
            "2026-01-01T01:00:00Z",
        )
        .unwrap();
        assert!(applied);

        // Second identical transition no longer matches the expected status.
        let applied = transition(
            &db,
            "src-2",
            SourceStatus::Pending,
            SourceStatus::Processing,
            &TransitionFields::default(),
            "2026-01-01T01:00:01Z",
        )
        .unwrap();
        assert!(!applied);
    }

    #[test]
    fn test_transition_records_fields() {
        let db = test_db();
        let mut source = sample_source("src-3");
        source.status = "processing".to_string();
        insert(&db, &source).unwrap();

        let fields = TransitionFields {
            approved_by: Some("bob".to_string()),
            approval_notes: Some("good deck".to_string()),
            approved_at: Some("2026-01-02T00:00:00Z".to_string()),
            ..Default::default()
        };
        assert!(transition(
            &db,
            "src-3",
            SourceStatus::Processing,
            SourceStatus::Approved,
            &fields,
            "2026-01-02T00:00:00Z",
        )
        .unwrap());

        let found = find_by_id(&db, "src-3").unwrap().unwrap();
        assert_eq!(found.status, "approved");
        assert_eq!(found.approved_by.as_deref(), Some("bob"));
        assert_eq!(found.approved_at.as_deref(), Some("2026-01-02T00:00:00Z"));
    }

    #[test]
    fn test_list_by_status_excludes_deleted() {
        let db = test_db();
        insert(&db, &sample_source("a")).unwrap();
        insert(&db, &sample_source("b")).unwrap();
        soft_delete(&db, "b", "2026-01-01T02:00:00Z").unwrap();

        let rows = list_by_status(&db, SourceStatus::Pending).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "a");
    }

    #[test]
    fn test_list_approved_with_filters() {
        let db = test_db();
        let mut approved = sample_source("f1");
        approved.status = "approved".to_string();
        approved.approved_at = Some("2026-01-02T00:00:00Z".to_string());
        insert(&db, &approved).unwrap();

        let mut other_industry = sample_source("f2");
        other_industry.status = "approved".to_string();
        other_industry.industry = Some("healthcare".to_string());
        other_industry.approved_at = Some("2026-01-03T00:00:00Z".to_string());
        insert(&db, &other_industry).unwrap();

        insert(&db, &sample_source("f3")).unwrap(); // still pending

        let all = list_approved(&db, &ApprovedFilter::default()).unwrap();
        assert_eq!(all.len(), 2);

        let fintech = list_approved(
            &db,
            &ApprovedFilter {
                industry: Some("fintech".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(fintech.len(), 1);
        assert_eq!(fintech[0].id, "f1");

        let tagged = list_approved(
            &db,
            &ApprovedFilter {
                tag: Some("sales".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(tagged.len(), 2);
    }

    #[test]
    fn test_transition_skips_deleted_rows() {
        let db = test_db();
        insert(&db, &sample_source("d1")).unwrap();
        soft_delete(&db, "d1", "2026-01-01T03:00:00Z").unwrap();

        let applied = transition(
            &db,
            "d1",
            SourceStatus::Pending,
            SourceStatus::Processing,
            &TransitionFields::default(),
            "2026-01-01T04:00:00Z",
        )
        .unwrap();
        assert!(!applied);
    }

    #[test]
    fn test_list_needing_training() {
        let db = test_db();
        let mut approved = sample_source("t1");
        approved.status = "approved".to_string();
        insert(&db, &approved).unwrap();

        // No slides yet: needs training.
        let rows = list_needing_training(&db).unwrap();
        assert_eq!(rows.len(), 1);

        // Slide without embedding: still needs training.
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO slides (id, source_id, ordinal, extracted_at)
                 VALUES ('sl1', 't1', 0, '2026-01-01')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        assert_eq!(list_needing_training(&db).unwrap().len(), 1);

        // Embedding present: done.
        db.with_conn(|conn| {
            conn.execute("UPDATE slides SET embedding = '[0.1]' WHERE id = 'sl1'", [])?;
            Ok(())
        })
        .unwrap();
        assert!(list_needing_training(&db).unwrap().is_empty());
    }
}
