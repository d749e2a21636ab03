//! Training job repository.
//!
//! Mutual exclusion for the single running job is enforced here with a
//! guarded INSERT against the persisted status column, not an in-process
//! mutex, so the invariant holds across processes sharing the database file.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw training job row from the database.
#[derive(Debug, Clone)]
pub struct TrainingJobRow {
    pub id: String,
    pub status: String,
    pub progress: u8,
    pub processed_count: u64,
    pub total_count: u64,
    pub error: Option<String>,
    /// JSON list of per-source error records.
    pub source_errors: Option<String>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub created_at: String,
}

impl TrainingJobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            status: row.get("status")?,
            progress: row.get::<_, i64>("progress")? as u8,
            processed_count: row.get::<_, i64>("processed_count")? as u64,
            total_count: row.get::<_, i64>("total_count")? as u64,
            error: row.get("error")?,
            source_errors: row.get("source_errors")?,
            started_at: row.get("started_at")?,
            finished_at: row.get("finished_at")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Attempts to create a new job in `queued` status.
///
/// The INSERT only fires when no other job is `queued` or `running`; the
/// whole check-and-set is one SQL statement, so two concurrent starters
/// cannot both succeed. Returns `false` when the slot is taken.
pub fn try_acquire(db: &Database, job_id: &str, created_at: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "INSERT INTO training_jobs (id, status, progress, processed_count, total_count, created_at)
             SELECT ?1, 'queued', 0, 0, 0, ?2
             WHERE NOT EXISTS (
                 SELECT 1 FROM training_jobs WHERE status IN ('queued', 'running')
             )",
            params![job_id, created_at],
        )?;
        Ok(affected == 1)
    })
}

/// Marks a queued job as running and records the start time and workload size.
pub fn mark_running(
    db: &Database,
    job_id: &str,
    total_count: u64,
    started_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE training_jobs SET status = 'running', total_count = ?2, started_at = ?3
             WHERE id = ?1 AND status = 'queued'",
            params![job_id, total_count as i64, started_at],
        )?;
        Ok(())
    })
}

/// Advances progress. `MAX(progress, ?2)` keeps the column monotone even if
/// updates arrive out of order.
pub fn update_progress(
    db: &Database,
    job_id: &str,
    processed_count: u64,
    progress: u8,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE training_jobs
             SET processed_count = ?2, progress = MAX(progress, ?3)
             WHERE id = ?1 AND status = 'running'",
            params![job_id, processed_count as i64, progress.min(100) as i64],
        )?;
        Ok(())
    })
}

/// Moves a job to a terminal status with optional error detail.
pub fn finish(
    db: &Database,
    job_id: &str,
    status: &str,
    error: Option<&str>,
    source_errors_json: Option<&str>,
    finished_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE training_jobs SET status = ?2, error = ?3, source_errors = ?4, finished_at = ?5
             WHERE id = ?1",
            params![job_id, status, error, source_errors_json, finished_at],
        )?;
        Ok(())
    })
}

/// Fails every job stranded in a non-terminal status.
///
/// Only meaningful at process startup, when no worker thread can still own a
/// `queued` or `running` row; without this a crash mid-job would hold the
/// [`try_acquire`] slot forever. Returns the number of reclaimed jobs.
pub fn reclaim_interrupted(db: &Database, finished_at: &str) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "UPDATE training_jobs
             SET status = 'failed', error = 'Interrupted before completion', finished_at = ?1
             WHERE status IN ('queued', 'running')",
            params![finished_at],
        )?;
        Ok(affected)
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<TrainingJobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM training_jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], TrainingJobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// The most recently created job, if any. A single SELECT, so pollers always
/// see a consistent status/progress pair.
pub fn latest(db: &Database) -> Result<Option<TrainingJobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM training_jobs ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )?;
        let mut rows = stmt.query_map([], TrainingJobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// All jobs, newest first. Historical runs are retained for audit.
pub fn list_all(db: &Database) -> Result<Vec<TrainingJobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM training_jobs ORDER BY created_at DESC, rowid DESC")?;
        let rows: Vec<TrainingJobRow> = stmt
            .query_map([], TrainingJobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
