//! Slide repository: extracted slide rows and their trained metadata.
//!
//! Embeddings and quality scores are written one row at a time so that a
//! cancelled or crashed training run never leaves a half-written slide.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw slide row from the database.
#[derive(Debug, Clone)]
pub struct SlideRow {
    pub id: String,
    pub source_id: String,
    pub ordinal: u32,
    pub title: String,
    pub body: String,
    pub layout: String,
    pub kind: String,
    /// JSON array of f32, NULL until the training job has processed it.
    pub embedding: Option<String>,
    pub quality: Option<f64>,
    pub extracted_at: String,
}

impl SlideRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            source_id: row.get("source_id")?,
            ordinal: row.get::<_, i64>("ordinal")? as u32,
            title: row.get("title")?,
            body: row.get("body")?,
            layout: row.get("layout")?,
            kind: row.get("kind")?,
            embedding: row.get("embedding")?,
            quality: row.get("quality")?,
            extracted_at: row.get("extracted_at")?,
        })
    }

    /// Decodes the embedding column, if present.
    pub fn parsed_embedding(&self) -> Result<Option<Vec<f32>>, DatabaseError> {
        match &self.embedding {
            None => Ok(None),
            Some(json) => serde_json::from_str(json)
                .map(Some)
                .map_err(|_| DatabaseError::CorruptValue {
                    column: "embedding",
                    value: json.clone(),
                }),
        }
    }

    /// Title and body joined for scoring and embedding.
    pub fn full_text(&self) -> String {
        if self.title.is_empty() {
            self.body.clone()
        } else if self.body.is_empty() {
            self.title.clone()
        } else {
            format!("{}\n{}", self.title, self.body)
        }
    }
}

/// A slide joined with its owning source's approval metadata. Only produced
/// by [`list_indexed_approved`], which re-verifies approval at query time.
#[derive(Debug, Clone)]
pub struct IndexedSlide {
    pub slide: SlideRow,
    pub source_title: Option<String>,
    pub source_industry: Option<String>,
    pub approved_at: String,
}

/// Inserts extracted slides for a source. Replaces any previous extraction.
pub fn replace_for_source(
    db: &Database,
    source_id: &str,
    slides: &[SlideRow],
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute("DELETE FROM slides WHERE source_id = ?1", params![source_id])?;
        let mut stmt = conn.prepare(
            "INSERT INTO slides (id, source_id, ordinal, title, body, layout, kind,
             embedding, quality, extracted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for slide in slides {
            stmt.execute(params![
                slide.id,
                slide.source_id,
                slide.ordinal as i64,
                slide.title,
                slide.body,
                slide.layout,
                slide.kind,
                slide.embedding,
                slide.quality,
                slide.extracted_at,
            ])?;
        }
        Ok(())
    })
}

/// Lists a source's slides in presentation order.
pub fn list_for_source(db: &Database, source_id: &str) -> Result<Vec<SlideRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM slides WHERE source_id = ?1 ORDER BY ordinal ASC")?;
        let rows: Vec<SlideRow> = stmt
            .query_map(params![source_id], SlideRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Writes one slide's embedding and quality score as a single atomic UPDATE.
pub fn set_trained(
    db: &Database,
    slide_id: &str,
    embedding_json: &str,
    quality: f64,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE slides SET embedding = ?2, quality = ?3 WHERE id = ?1",
            params![slide_id, embedding_json, quality],
        )?;
        Ok(())
    })
}

/// All indexed slides whose owning source is approved and not soft-deleted,
/// joined with the approval timestamp.
///
/// The approval filter runs here, at query time, every time. The matcher must
/// never cache this result across generation requests.
pub fn list_indexed_approved(db: &Database) -> Result<Vec<IndexedSlide>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT sl.*, s.title AS source_title, s.industry AS source_industry,
                    s.approved_at AS source_approved_at
             FROM slides sl
             JOIN sources s ON s.id = sl.source_id
             WHERE s.status = 'approved' AND s.deleted = 0
               AND sl.embedding IS NOT NULL AND sl.quality IS NOT NULL
             ORDER BY sl.source_id, sl.ordinal",
        )?;
        let rows: Vec<IndexedSlide> = stmt
            .query_map([], |row| {
                Ok(IndexedSlide {
                    slide: SlideRow::from_row(row)?,
                    source_title: row.get("source_title")?,
                    source_industry: row.get("source_industry")?,
                    approved_at: row
                        .get::<_, Option<String>>("source_approved_at")?
                        .unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Counts slides that still lack an embedding for the given source.
pub fn count_untrained(db: &Database, source_id: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM slides WHERE source_id = ?1 AND embedding IS NULL",
            params![source_id],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
