use std::path::PathBuf;
use thiserror::Error;

use crate::source::SourceStatus;

#[derive(Error, Debug)]
pub enum SlideforgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Approval error: {0}")]
    Approval(#[from] ApprovalError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Training error: {0}")]
    Training(#[from] TrainingError),

    #[error("Matching error: {0}")]
    Match(#[from] MatchError),

    #[error("Scoring error: {0}")]
    Scorer(#[from] ScorerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Errors from the approval gate. State machine violations are never
/// retried automatically; caller input defects are rejected immediately.
#[derive(Error, Debug)]
pub enum ApprovalError {
    #[error("Illegal status transition from '{from}' to '{to}'")]
    InvalidTransition {
        from: SourceStatus,
        to: SourceStatus,
    },

    #[error("Rejection requires a non-empty reason")]
    MissingReason,

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported presentation format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read source file '{path}': {source}")]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process PPTX: {0}")]
    PptxProcessing(String),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),

    #[error("No slides found in '{0}'")]
    Empty(PathBuf),
}

#[derive(Error, Debug)]
pub enum TrainingError {
    /// A job is already queued or running. Callers may poll and retry later.
    #[error("A training job is already running")]
    AlreadyRunning,

    #[error("Training job not found: {0}")]
    JobNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum MatchError {
    /// Business-rule signal, not a system failure: no indexed slide from an
    /// approved source cleared the relevance threshold. Surfaced verbatim so
    /// the caller can prompt for more sources.
    #[error("No approved content matched the request")]
    InsufficientContent,

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

/// Errors from the relevance-scoring collaborator.
#[derive(Error, Debug)]
pub enum ScorerError {
    #[error("Scoring service unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid scorer response: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, SlideforgeError>;
