//! Content matcher: ranks indexed slides against a generation request.
//!
//! The candidate universe is re-read from the database on every call through
//! the approved-only join, never cached: a source rejected or soft-deleted a
//! millisecond before generation is already invisible here.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::db::{slide_repo, Database};
use crate::error::MatchError;
use crate::extractor::SlideKind;
use crate::scoring::{cosine_similarity, embed, RelevanceScorer, ScoreContext};

/// Weight of the scorer verdict vs. the embedding similarity in the
/// combined relevance score.
const SCORER_WEIGHT: f32 = 0.7;
const EMBEDDING_WEIGHT: f32 = 0.3;

/// What the caller wants generated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub topic: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    pub slide_count: usize,
    #[serde(default)]
    pub requirements: Vec<String>,
}

impl GenerationRequest {
    fn score_context(&self) -> ScoreContext {
        ScoreContext {
            topic: self.topic.clone(),
            customer: self.customer.clone(),
            industry: self.industry.clone(),
            audience: self.audience.clone(),
            requirements: self.requirements.clone(),
        }
    }

    /// Text embedded as the request vector.
    fn embedding_text(&self) -> String {
        let mut parts = vec![self.topic.clone()];
        if let Some(industry) = &self.industry {
            parts.push(industry.clone());
        }
        parts.extend(self.requirements.iter().cloned());
        parts.join(" ")
    }
}

/// How a matched slide should be used in the assembled presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateAction {
    /// High confidence, reuse the slide verbatim.
    CopyExact,
    /// Good match, adapt the wording to the request.
    Enhance,
    /// Weak but above threshold, use as raw material only.
    Rework,
}

impl CandidateAction {
    pub fn from_score(score: f32) -> Self {
        if score >= 0.8 {
            CandidateAction::CopyExact
        } else if score >= 0.6 {
            CandidateAction::Enhance
        } else {
            CandidateAction::Rework
        }
    }
}

/// A ranked slide from an approved source.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub slide_id: String,
    pub source_id: String,
    pub ordinal: u32,
    pub title: String,
    pub body: String,
    pub kind: SlideKind,
    pub score: f32,
    pub rationale: String,
    pub action: CandidateAction,
    pub approved_at: String,
}

pub struct ContentMatcher {
    db: Database,
    scorer: Arc<dyn RelevanceScorer>,
    min_score: f32,
}

impl ContentMatcher {
    pub fn new(db: Database, scorer: Arc<dyn RelevanceScorer>, min_score: f32) -> Self {
        Self {
            db,
            scorer,
            min_score,
        }
    }

    /// Ranks all indexed slides from approved sources against the request
    /// and returns at most `slide_count` candidates above the threshold.
    pub fn match_slides(&self, request: &GenerationRequest) -> Result<Vec<Candidate>, MatchError> {
        let mut candidates = self.rank(request)?;
        candidates.truncate(request.slide_count);
        Ok(candidates)
    }

    /// Like [`match_slides`](Self::match_slides) but without the length cut,
    /// so downstream diversity rules can substitute capped-out candidates.
    pub fn rank(&self, request: &GenerationRequest) -> Result<Vec<Candidate>, MatchError> {
        let _span = tracing::info_span!("matcher.rank").entered();

        let indexed = slide_repo::list_indexed_approved(&self.db)?;
        log::debug!(
            "Matching '{}' against {} indexed slide(s)",
            request.topic,
            indexed.len()
        );

        let ctx = request.score_context();
        let request_vector = embed(&request.embedding_text());

        let mut candidates: Vec<Candidate> = Vec::new();
        for entry in indexed {
            let slide = entry.slide;
            let vector = slide.parsed_embedding()?.unwrap_or_default();
            let similarity = cosine_similarity(&request_vector, &vector);

            let text = slide.full_text();
            let (score, rationale) = match self.scorer.score(&text, &ctx) {
                Ok(scored) => (
                    SCORER_WEIGHT * scored.score + EMBEDDING_WEIGHT * similarity,
                    scored.rationale,
                ),
                Err(e) => {
                    // Degraded mode: rank on embedding similarity alone
                    // rather than failing the whole request.
                    log::warn!("Scorer unavailable for slide {}: {}", slide.id, e);
                    (similarity, "Ranked by similarity only".to_string())
                }
            };

            if score < self.min_score {
                continue;
            }

            let kind = SlideKind::parse(&slide.kind).unwrap_or(SlideKind::Content);
            candidates.push(Candidate {
                slide_id: slide.id,
                source_id: slide.source_id,
                ordinal: slide.ordinal,
                title: slide.title,
                body: slide.body,
                kind,
                score,
                rationale,
                action: CandidateAction::from_score(score),
                approved_at: entry.approved_at,
            });
        }

        if candidates.is_empty() {
            return Err(MatchError::InsufficientContent);
        }

        // Best first; equal scores break towards the most recently approved
        // source so fresh content wins.
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.approved_at.cmp(&a.approved_at))
        });

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::StubScorer;

    fn request(topic: &str, slide_count: usize) -> GenerationRequest {
        GenerationRequest {
            topic: topic.to_string(),
            customer: None,
            industry: None,
            audience: None,
            style: None,
            slide_count,
            requirements: vec![],
        }
    }

    fn insert_approved_source(db: &Database, id: &str, approved_at: &str) {
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sources (id, owner, filename, file_path, status, approved_at,
                 created_at, updated_at)
                 VALUES (?1, 'alice', 'deck.txt', '/tmp/deck.txt', 'approved', ?2,
                 '2026-01-01', '2026-01-01')",
                rusqlite::params![id, approved_at],
            )?;
            Ok(())
        })
        .unwrap();
    }

    fn insert_trained_slide(db: &Database, id: &str, source_id: &str, ordinal: u32, text: &str) {
        let embedding = serde_json::to_string(&embed(text)).unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO slides (id, source_id, ordinal, title, body, layout, kind,
                 embedding, quality, extracted_at)
                 VALUES (?1, ?2, ?3, ?4, '', '1 block', 'content', ?5, 0.8, '2026-01-01')",
                rusqlite::params![id, source_id, ordinal as i64, text, embedding],
            )?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_action_bands() {
        assert_eq!(CandidateAction::from_score(0.95), CandidateAction::CopyExact);
        assert_eq!(CandidateAction::from_score(0.8), CandidateAction::CopyExact);
        assert_eq!(CandidateAction::from_score(0.7), CandidateAction::Enhance);
        assert_eq!(CandidateAction::from_score(0.6), CandidateAction::Enhance);
        assert_eq!(CandidateAction::from_score(0.5), CandidateAction::Rework);
    }

    #[test]
    fn test_no_indexed_content_is_insufficient() {
        let db = Database::open_in_memory().unwrap();
        let matcher = ContentMatcher::new(db, Arc::new(StubScorer::new(0.9)), 0.35);
        assert!(matches!(
            matcher.match_slides(&request("payments", 3)),
            Err(MatchError::InsufficientContent)
        ));
    }

    #[test]
    fn test_ranks_and_truncates() {
        let db = Database::open_in_memory().unwrap();
        insert_approved_source(&db, "s1", "2026-01-02T00:00:00Z");
        insert_trained_slide(&db, "high", "s1", 0, "mobile payments growth");
        insert_trained_slide(&db, "low", "s1", 1, "office relocation plan");
        insert_trained_slide(&db, "mid", "s1", 2, "payments compliance rules");

        let scorer = StubScorer::new(0.4)
            .with_score("mobile payments growth", 0.95)
            .with_score("payments compliance", 0.7);
        let matcher = ContentMatcher::new(db, Arc::new(scorer), 0.35);

        let candidates = matcher.match_slides(&request("mobile payments", 2)).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].slide_id, "high");
        assert_eq!(candidates[1].slide_id, "mid");
        assert!(candidates[0].score > candidates[1].score);
    }

    #[test]
    fn test_threshold_filters_weak_matches() {
        let db = Database::open_in_memory().unwrap();
        insert_approved_source(&db, "s1", "2026-01-02T00:00:00Z");
        insert_trained_slide(&db, "weak", "s1", 0, "unrelated gardening notes");

        let matcher = ContentMatcher::new(db, Arc::new(StubScorer::new(0.1)), 0.35);
        assert!(matches!(
            matcher.match_slides(&request("fintech payments", 3)),
            Err(MatchError::InsufficientContent)
        ));
    }

    #[test]
    fn test_tie_breaks_toward_recent_approval() {
        let db = Database::open_in_memory().unwrap();
        insert_approved_source(&db, "old", "2026-01-01T00:00:00Z");
        insert_approved_source(&db, "new", "2026-02-01T00:00:00Z");
        insert_trained_slide(&db, "a", "old", 0, "identical payments slide");
        insert_trained_slide(&db, "b", "new", 0, "identical payments slide");

        let matcher = ContentMatcher::new(db, Arc::new(StubScorer::new(0.9)), 0.35);
        let candidates = matcher.match_slides(&request("payments", 2)).unwrap();
        assert_eq!(candidates[0].source_id, "new");
    }

    #[test]
    fn test_scorer_outage_degrades_to_similarity() {
        let db = Database::open_in_memory().unwrap();
        insert_approved_source(&db, "s1", "2026-01-02T00:00:00Z");
        insert_trained_slide(&db, "a", "s1", 0, "mobile payments adoption in banking");

        // Scorer always fails; the embedding component alone must carry.
        let scorer = StubScorer::new(0.9).failing_first(usize::MAX);
        let matcher = ContentMatcher::new(db, Arc::new(scorer), 0.35);

        let candidates = matcher
            .match_slides(&request("mobile payments adoption banking", 1))
            .unwrap();
        assert_eq!(candidates[0].rationale, "Ranked by similarity only");
    }

    #[test]
    fn test_unapproved_sources_invisible() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sources (id, owner, filename, file_path, status,
                 created_at, updated_at)
                 VALUES ('p1', 'alice', 'deck.txt', '/tmp/deck.txt', 'pending',
                 '2026-01-01', '2026-01-01')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        insert_trained_slide(&db, "a", "p1", 0, "great payments content");

        let matcher = ContentMatcher::new(db, Arc::new(StubScorer::new(0.9)), 0.35);
        assert!(matches!(
            matcher.match_slides(&request("payments", 1)),
            Err(MatchError::InsufficientContent)
        ));
    }
}
