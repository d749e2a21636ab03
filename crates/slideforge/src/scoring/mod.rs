//! Relevance scoring. The scorer sits behind a trait so the pipeline can run
//! against the deterministic lexical implementation, a remote model, or a
//! stub in tests without touching the callers.

pub mod embedding;
pub mod lexical;
pub mod retry;
pub mod stub;

use serde::{Deserialize, Serialize};

use crate::error::ScorerError;

pub use embedding::{cosine_similarity, embed, EMBEDDING_DIM};
pub use lexical::LexicalScorer;
pub use retry::{RetryPolicy, RetryScorer};
pub use stub::StubScorer;

/// What the caller is trying to build, passed to the scorer as context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreContext {
    pub topic: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
}

/// A scorer verdict for one piece of slide text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scored {
    /// Relevance in `[0.0, 1.0]`.
    pub score: f32,
    /// Short human-readable justification, surfaced to reviewers.
    pub rationale: String,
}

pub trait RelevanceScorer: Send + Sync {
    /// Scores slide text against the request context.
    fn score(&self, text: &str, ctx: &ScoreContext) -> Result<Scored, ScorerError>;

    /// Produces an adapted version of slide text for the request context.
    /// Used for candidates that need enhancement rather than verbatim reuse.
    fn enhance(&self, text: &str, ctx: &ScoreContext) -> Result<String, ScorerError>;
}

/// Clamps a raw scorer value into the valid score range.
pub(crate) fn clamp_score(raw: f32) -> f32 {
    raw.clamp(0.0, 1.0)
}
