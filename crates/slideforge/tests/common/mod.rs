//! Test harness for isolated pipeline execution.
//!
//! `PipelineHarness` wires a full `PresentationService` over an in-memory
//! database and a scripted scorer, with a temp directory for uploaded decks.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use slideforge::db::Database;
use slideforge::scoring::StubScorer;
use slideforge::{Config, NewSource, PresentationService, Source};

pub struct PipelineHarness {
    temp_dir: TempDir,
    pub db: Database,
    pub service: PresentationService,
}

impl PipelineHarness {
    /// Harness with an optimistic scorer: everything scores 0.9.
    pub fn new() -> Self {
        Self::with_scorer(StubScorer::new(0.9))
    }

    pub fn with_scorer(scorer: StubScorer) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open_in_memory().expect("Failed to open test database");
        let service =
            PresentationService::with_scorer(&Config::default(), db.clone(), Arc::new(scorer));
        Self {
            temp_dir,
            db,
            service,
        }
    }

    /// Writes a text deck into the harness directory. Blocks are separated
    /// by `---` lines; the first line of each block is the slide title.
    pub fn write_deck(&self, filename: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(filename);
        std::fs::write(&path, content).expect("Failed to write deck file");
        path
    }

    /// Uploads a deck file as the given owner.
    pub fn upload(&self, filename: &str, content: &str) -> Source {
        let path = self.write_deck(filename, content);
        self.service
            .upload(NewSource {
                owner: "alice".to_string(),
                filename: filename.to_string(),
                file_path: path.to_string_lossy().to_string(),
                byte_size: content.len() as u64,
                title: Some(filename.trim_end_matches(".txt").to_string()),
                industry: Some("fintech".to_string()),
                tags: vec![],
            })
            .expect("Upload failed")
    }

    /// Uploads and approves a deck, ready for training.
    pub fn upload_approved(&self, filename: &str, content: &str) -> Source {
        let source = self.upload(filename, content);
        self.service
            .approve(&source.id, "bob", None)
            .expect("Approval failed")
    }

    /// Runs one training job to completion and returns its final status.
    pub fn train(&self) -> slideforge::TrainingStatus {
        self.service.start_training().expect("Training start failed");
        self.service.wait_for_training();
        self.service.training_status().expect("No training status")
    }
}
