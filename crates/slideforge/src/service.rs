//! Facade wiring the full pipeline: upload, approval, training, generation.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::assembler::{ArtifactDescriptor, Assembler};
use crate::config::Config;
use crate::db::{slide_repo, Database};
use crate::error::{Result, SlideforgeError, TrainingError};
use crate::extractor::ExtractorRegistry;
use crate::matcher::{Candidate, ContentMatcher, GenerationRequest};
use crate::scoring::{LexicalScorer, RelevanceScorer, RetryPolicy, RetryScorer};
use crate::source::{ApprovalGate, NewSource, Source, SourceStatus, SourceStore};
use crate::training::{TrainingBroadcaster, TrainingCoordinator, TrainingStatus};

pub struct PresentationService {
    store: SourceStore,
    gate: ApprovalGate,
    coordinator: TrainingCoordinator,
    matcher: ContentMatcher,
    assembler: Assembler,
    extractors: ExtractorRegistry,
    db: Database,
}

impl PresentationService {
    /// Opens (or creates) the database under the configured data directory
    /// and wires the default scorer behind the configured retry policy.
    pub fn new(config: &Config) -> Result<Self> {
        let db = match &config.data_dir {
            Some(dir) => Database::open(&dir.join("slideforge.db"))?,
            None => {
                let path = crate::db::default_database_path().ok_or_else(|| {
                    crate::error::ConfigError::Validation {
                        message: "Could not determine a home directory for the data dir"
                            .to_string(),
                    }
                })?;
                Database::open(&path)?
            }
        };
        let policy = RetryPolicy {
            max_attempts: config.scorer.max_attempts,
            backoff: Duration::from_millis(config.scorer.backoff_ms),
        };
        let scorer: Arc<dyn RelevanceScorer> =
            Arc::new(RetryScorer::new(LexicalScorer::new(), policy));
        let service = Self::with_scorer(config, db, scorer);
        // Jobs stranded by a crashed predecessor would hold the training
        // slot forever; fail them before anything can start.
        service.coordinator.recover()?;
        Ok(service)
    }

    /// Wires the service over an explicit database and scorer. Tests use this
    /// with an in-memory database and a stub scorer.
    pub fn with_scorer(config: &Config, db: Database, scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self {
            store: SourceStore::new(db.clone()),
            gate: ApprovalGate::new(db.clone()),
            coordinator: TrainingCoordinator::new(db.clone(), Arc::clone(&scorer)),
            matcher: ContentMatcher::new(db.clone(), Arc::clone(&scorer), config.matching.min_score),
            assembler: Assembler::new(scorer, config.matching.max_source_share),
            extractors: ExtractorRegistry::new(),
            db,
        }
    }

    /// Registers an upload and extracts its slides immediately. The source
    /// lands in `processing`, awaiting an approval decision; extraction
    /// failure moves it to `failed` and surfaces the error.
    pub fn upload(&self, new: NewSource) -> Result<Source> {
        let source = self.store.create(new)?;
        self.gate.begin_processing(&source.id)?;

        match self.extract_slides(&source) {
            Ok(count) => {
                log::info!("Extracted {} slide(s) from source {}", count, source.id);
                Ok(self.store.get(&source.id)?)
            }
            Err(e) => {
                let detail = e.to_string();
                self.gate.mark_failed(&source.id, &detail)?;
                Err(e)
            }
        }
    }

    fn extract_slides(&self, source: &Source) -> Result<usize> {
        let extracted = self.extractors.extract(Path::new(&source.file_path))?;
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
            .map_err(SlideforgeError::from)?;
        Ok(rows.len())
    }

    pub fn approve(&self, id: &str, actor: &str, notes: Option<&str>) -> Result<Source> {
        Ok(self.gate.approve(id, actor, notes)?)
    }

    pub fn reject(&self, id: &str, actor: &str, reason: &str) -> Result<Source> {
        Ok(self.gate.reject(id, actor, reason)?)
    }

    pub fn source(&self, id: &str) -> Result<Source> {
        Ok(self.store.get(id)?)
    }

    pub fn sources_by_status(&self, status: SourceStatus) -> Result<Vec<Source>> {
        Ok(self.store.list_by_status(status)?)
    }

    pub fn soft_delete(&self, id: &str, actor: &str) -> Result<()> {
        Ok(self.store.soft_delete(id, actor)?)
    }

    /// Starts a background training job over every approved source that is
    /// not fully indexed yet.
    pub fn start_training(&self) -> Result<String> {
        Ok(self.coordinator.start()?)
    }

    /// Status of the most recent training job.
    pub fn training_status(&self) -> Result<TrainingStatus> {
        self.coordinator
            .latest_status()?
            .ok_or_else(|| TrainingError::JobNotFound("latest".to_string()).into())
    }

    pub fn cancel_training(&self) {
        self.coordinator.cancel();
    }

    /// Blocks until the current training job finishes. Intended for tests
    /// and shutdown paths.
    pub fn wait_for_training(&self) {
        self.coordinator.wait();
    }

    pub fn training_events(&self) -> &TrainingBroadcaster {
        self.coordinator.broadcaster()
    }

    /// Ranks approved content for the request without assembling a deck.
    pub fn match_content(&self, request: &GenerationRequest) -> Result<Vec<Candidate>> {
        Ok(self.matcher.match_slides(request)?)
    }

    /// Full generation: match against approved indexed content, then
    /// assemble the deck outline.
    pub fn generate(&self, request: &GenerationRequest) -> Result<ArtifactDescriptor> {
        let candidates = self.matcher.rank(request)?;
        Ok(self.assembler.assemble(request, candidates))
    }
}
