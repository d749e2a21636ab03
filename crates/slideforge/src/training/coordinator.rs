//! Training job coordinator.
//!
//! A training run extracts slides for any approved source that still lacks
//! them, then computes embeddings and quality scores per slide. Only one job
//! may be queued or running at a time; the slot is claimed through the
//! persisted check-and-set in the training repository, so the guarantee
//! holds even across processes sharing the database.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use chrono::Utc;
use serde::Serialize;

use crate::db::source_repo::{self, SourceRow};
use crate::db::{slide_repo, training_repo, Database};
use crate::error::TrainingError;
use crate::extractor::ExtractorRegistry;
use crate::scoring::{embed, RelevanceScorer, ScoreContext};
use crate::training::progress::{TrainingBroadcaster, TrainingPhase};

/// One failed source inside an otherwise surviving job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceError {
    pub source_id: String,
    pub error: String,
}

/// Snapshot of a job for pollers. Read in a single query, so status and
/// progress are never torn.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingStatus {
    pub job_id: String,
    pub status: String,
    pub progress: u8,
    pub processed_count: u64,
    pub total_count: u64,
    pub error: Option<String>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

pub struct TrainingCoordinator {
    db: Database,
    extractors: Arc<ExtractorRegistry>,
    scorer: Arc<dyn RelevanceScorer>,
    broadcaster: TrainingBroadcaster,
    cancel: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TrainingCoordinator {
    pub fn new(db: Database, scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self {
            db,
            extractors: Arc::new(ExtractorRegistry::new()),
            scorer,
            broadcaster: TrainingBroadcaster::default(),
            cancel: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    pub fn broadcaster(&self) -> &TrainingBroadcaster {
        &self.broadcaster
    }

    /// Starts a background training job. Fails with `AlreadyRunning` when
    /// another job holds the slot; the caller may poll and retry.
    pub fn start(&self) -> Result<String, TrainingError> {
        let job_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        if !training_repo::try_acquire(&self.db, &job_id, &now)? {
            log::info!("Training start refused, a job is already active");
            return Err(TrainingError::AlreadyRunning);
        }

        self.cancel.store(false, Ordering::SeqCst);
        self.broadcaster.progress(
            &job_id,
            TrainingPhase::Queued,
            0,
            0,
            0,
            "Training job queued",
        );

        let worker = JobWorker {
            db: self.db.clone(),
            extractors: Arc::clone(&self.extractors),
            scorer: Arc::clone(&self.scorer),
            broadcaster: self.broadcaster.clone(),
            cancel: Arc::clone(&self.cancel),
            job_id: job_id.clone(),
        };

        let spawned = std::thread::Builder::new()
            .name("training".to_string())
            .spawn(move || worker.run());
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                // Release the acquired slot, otherwise every retry would see
                // AlreadyRunning against a job no worker owns.
                training_repo::finish(
                    &self.db,
                    &job_id,
                    "failed",
                    Some("Failed to spawn training worker"),
                    None,
                    &Utc::now().to_rfc3339(),
                )?;
                return Err(TrainingError::Database(crate::db::DatabaseError::Io {
                    path: std::path::PathBuf::from("training worker"),
                    source: e,
                }));
            }
        };

        if let Ok(mut guard) = self.handle.lock() {
            *guard = Some(handle);
        }

        log::info!("Training job {} started", job_id);
        Ok(job_id)
    }

    /// Fails every job left `queued` or `running` by an earlier process.
    ///
    /// Must run once at startup, before the first `start()`: at that point no
    /// worker thread exists, so any non-terminal row is an orphan from a
    /// crash and would hold the slot forever. Returns the reclaim count.
    pub fn recover(&self) -> Result<usize, TrainingError> {
        let reclaimed = training_repo::reclaim_interrupted(&self.db, &Utc::now().to_rfc3339())?;
        if reclaimed > 0 {
            log::warn!("Marked {} interrupted training job(s) as failed", reclaimed);
        }
        Ok(reclaimed)
    }

    /// Requests cancellation of the running job. The worker checks the flag
    /// between sources, so already-trained slides are kept.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Blocks until the current background job finishes.
    pub fn wait(&self) {
        let handle = self.handle.lock().ok().and_then(|mut g| g.take());
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    /// Status of the most recent job, if any ever ran.
    pub fn latest_status(&self) -> Result<Option<TrainingStatus>, TrainingError> {
        Ok(training_repo::latest(&self.db)?.map(row_to_status))
    }

    /// Status of a specific job.
    pub fn status(&self, job_id: &str) -> Result<TrainingStatus, TrainingError> {
        training_repo::find_by_id(&self.db, job_id)?
            .map(row_to_status)
            .ok_or_else(|| TrainingError::JobNotFound(job_id.to_string()))
    }

    /// Full job history, newest first.
    pub fn history(&self) -> Result<Vec<TrainingStatus>, TrainingError> {
        Ok(training_repo::list_all(&self.db)?
            .into_iter()
            .map(row_to_status)
            .collect())
    }
}

fn row_to_status(row: training_repo::TrainingJobRow) -> TrainingStatus {
    TrainingStatus {
        job_id: row.id,
        status: row.status,
        progress: row.progress,
        processed_count: row.processed_count,
        total_count: row.total_count,
        error: row.error,
        started_at: row.started_at,
        finished_at: row.finished_at,
    }
}

struct JobWorker {
    db: Database,
    extractors: Arc<ExtractorRegistry>,
    scorer: Arc<dyn RelevanceScorer>,
    broadcaster: TrainingBroadcaster,
    cancel: Arc<AtomicBool>,
    job_id: String,
}

impl JobWorker {
    fn run(self) {
        if let Err(e) = self.run_inner() {
            log::error!("Training job {} aborted: {}", self.job_id, e);
            let _ = training_repo::finish(
                &self.db,
                &self.job_id,
                "failed",
                Some(&e.to_string()),
                None,
                &Utc::now().to_rfc3339(),
            );
            let mut event = crate::training::progress::TrainingProgressEvent::new(
                &self.job_id,
                TrainingPhase::Failed,
                "Training aborted",
            );
            event.error = Some(e.to_string());
            self.broadcaster.send(event);
        }
    }

    fn run_inner(&self) -> Result<(), TrainingError> {
        let sources = source_repo::list_needing_training(&self.db)?;
        let total = sources.len() as u64;

        training_repo::mark_running(&self.db, &self.job_id, total, &Utc::now().to_rfc3339())?;
        log::info!(
            "Training job {} running over {} source(s)",
            self.job_id,
            total
        );

        let mut processed = 0u64;
        let mut progress = 0u8;
        let mut source_errors: Vec<SourceError> = Vec::new();
        let mut cancelled = false;

        for source in &sources {
            if self.cancel.load(Ordering::SeqCst) {
                cancelled = true;
                break;
            }

            match self.train_source(source) {
                Ok(()) => {
                    processed += 1;
                    // Integer floor: progress only reaches 100 when every
                    // source has been handled.
                    progress = ((processed * 100) / total.max(1)) as u8;
                    training_repo::update_progress(&self.db, &self.job_id, processed, progress)?;
                    self.broadcaster.progress(
                        &self.job_id,
                        TrainingPhase::Indexing,
                        progress,
                        processed,
                        total,
                        &format!("Trained source {}", source.id),
                    );
                }
                Err(e) => {
                    // One bad source never takes down the whole run.
                    log::warn!(
                        "Training job {}: source {} failed: {}",
                        self.job_id,
                        source.id,
                        e
                    );
                    source_errors.push(SourceError {
                        source_id: source.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let errors_json = if source_errors.is_empty() {
            None
        } else {
            serde_json::to_string(&source_errors).ok()
        };

        let (status, phase, error) = if cancelled {
            ("cancelled", TrainingPhase::Cancelled, None)
        } else if processed == 0 && !source_errors.is_empty() {
            (
                "failed",
                TrainingPhase::Failed,
                Some("All sources failed to train".to_string()),
            )
        } else {
            ("completed", TrainingPhase::Completed, None)
        };

        training_repo::finish(
            &self.db,
            &self.job_id,
            status,
            error.as_deref(),
            errors_json.as_deref(),
            &Utc::now().to_rfc3339(),
        )?;

        // The terminal event keeps the last reported progress; a cancelled
        // job never appears to roll back.
        let final_progress = if status == "completed" { 100 } else { progress };
        self.broadcaster.progress(
            &self.job_id,
            phase,
            final_progress,
            processed,
            total,
            &format!("Training {}", status),
        );
        log::info!(
            "Training job {} {}: {}/{} sources, {} error(s)",
            self.job_id,
            status,
            processed,
            total,
            source_errors.len()
        );
        Ok(())
    }

    /// Extracts (if needed), embeds and quality-scores every slide of one
    /// source. Each slide is committed individually so a later failure never
    /// rolls back earlier slides.
    fn train_source(&self, source: &SourceRow) -> Result<(), String> {
        let mut slides =
            slide_repo::list_for_source(&self.db, &source.id).map_err(|e| e.to_string())?;

        if slides.is_empty() {
            self.broadcaster.progress(
                &self.job_id,
                TrainingPhase::Extracting,
                0,
                0,
                0,
                &format!("Extracting {}", source.filename),
            );
            let extracted = self
                .extractors
                .extract(std::path::Path::new(&source.file_path))
                .map_err(|e| e.to_string())?;

            let now = Utc::now().to_rfc3339();
            let rows: Vec<slide_repo::SlideRow> = extracted
                .into_iter()
                .map(|s| slide_repo::SlideRow {
                    id: uuid::Uuid::new_v4().to_string(),
                    source_id: source.id.clone(),
                    ordinal: s.ordinal,
                    title: s.title,
                    body: s.body,
                    layout: s.layout,
                    kind: s.kind.as_str().to_string(),
                    embedding: None,
                    quality: None,
                    extracted_at: now.clone(),
                })
                .collect();
            slide_repo::replace_for_source(&self.db, &source.id, &rows)
                .map_err(|e| e.to_string())?;
            slides = rows;
        }

        let ctx = ScoreContext {
            topic: source
                .title
                .clone()
                .unwrap_or_else(|| source.filename.clone()),
            industry: source.industry.clone(),
            ..Default::default()
        };

        for slide in &slides {
            if slide.embedding.is_some() {
                continue;
            }
            let text = slide.full_text();
            let vector = embed(&text);
            let embedding_json =
                serde_json::to_string(&vector).map_err(|e| e.to_string())?;

            let quality = self
                .scorer
                .score(&text, &ctx)
                .map_err(|e| e.to_string())?
                .score as f64;

            slide_repo::set_trained(&self.db, &slide.id, &embedding_json, quality)
                .map_err(|e| e.to_string())?;
        }

        Ok(())
    }
}
