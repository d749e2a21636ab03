pub mod assembler;
pub mod config;
pub mod db;
pub mod error;
pub mod extractor;
pub mod logging;
pub mod matcher;
pub mod scoring;
pub mod service;
pub mod source;
pub mod training;

pub use assembler::{ArtifactDescriptor, Assembler, SlideRef};
pub use config::{load_config, Config};
pub use error::{
    ApprovalError, ConfigError, ExtractError, MatchError, Result, ScorerError, SlideforgeError,
    TrainingError,
};
pub use matcher::{Candidate, CandidateAction, ContentMatcher, GenerationRequest};
pub use service::PresentationService;
pub use source::{ApprovalGate, NewSource, Source, SourceStatus, SourceStore};
pub use training::{TrainingCoordinator, TrainingPhase, TrainingStatus};
