//! Presentation assembler: turns ranked candidates into a deck outline.
//!
//! Diversity rule: no single source may supply more than its share of the
//! deck. The cap is applied on the ranked list; if it leaves the deck short,
//! the best capped-out candidates refill the remaining seats.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::extractor::SlideKind;
use crate::matcher::{Candidate, CandidateAction, GenerationRequest};
use crate::scoring::{RelevanceScorer, ScoreContext};

/// One slide in the assembled deck, with provenance back to its source.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideRef {
    pub slide_id: String,
    pub source_id: String,
    pub title: String,
    pub content: String,
    pub kind: SlideKind,
    pub action: CandidateAction,
    pub score: f32,
    pub rationale: String,
}

/// The assembled presentation outline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDescriptor {
    pub id: String,
    pub title: String,
    pub style: Option<String>,
    pub slides: Vec<SlideRef>,
    pub created_at: String,
}

pub struct Assembler {
    scorer: Arc<dyn RelevanceScorer>,
    /// Maximum fraction of the deck any one source may supply, `(0.0, 1.0]`.
    max_source_share: f32,
}

impl Assembler {
    pub fn new(scorer: Arc<dyn RelevanceScorer>, max_source_share: f32) -> Self {
        Self {
            scorer,
            max_source_share: max_source_share.clamp(0.1, 1.0),
        }
    }

    pub fn assemble(
        &self,
        request: &GenerationRequest,
        candidates: Vec<Candidate>,
    ) -> ArtifactDescriptor {
        let picked = self.pick_diverse(request.slide_count, candidates);
        let ordered = order_slides(picked);

        let ctx = ScoreContext {
            topic: request.topic.clone(),
            customer: request.customer.clone(),
            industry: request.industry.clone(),
            audience: request.audience.clone(),
            requirements: request.requirements.clone(),
        };

        let slides = ordered
            .into_iter()
            .map(|c| {
                let content = match c.action {
                    CandidateAction::CopyExact => c.body.clone(),
                    CandidateAction::Enhance | CandidateAction::Rework => {
                        // Enhancement is best-effort: on scorer failure the
                        // original body still ships.
                        self.scorer.enhance(&c.body, &ctx).unwrap_or_else(|e| {
                            log::warn!("Enhancement failed for slide {}: {}", c.slide_id, e);
                            c.body.clone()
                        })
                    }
                };
                SlideRef {
                    slide_id: c.slide_id,
                    source_id: c.source_id,
                    title: c.title,
                    content,
                    kind: c.kind,
                    action: c.action,
                    score: c.score,
                    rationale: c.rationale,
                }
            })
            .collect();

        ArtifactDescriptor {
            id: uuid::Uuid::new_v4().to_string(),
            title: request.topic.clone(),
            style: request.style.clone(),
            slides,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    /// Applies the per-source cap, then refills any shortfall with the best
    /// remaining candidates regardless of source.
    fn pick_diverse(&self, slide_count: usize, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let cap = ((slide_count as f32 * self.max_source_share).ceil() as usize).max(1);

        let mut per_source: HashMap<String, usize> = HashMap::new();
        let mut picked: Vec<Candidate> = Vec::new();
        let mut overflow: Vec<Candidate> = Vec::new();

        for candidate in candidates {
            if picked.len() == slide_count {
                break;
            }
            let used = per_source.entry(candidate.source_id.clone()).or_insert(0);
            if *used < cap {
                *used += 1;
                picked.push(candidate);
            } else {
                overflow.push(candidate);
            }
        }

        // Shortfall: diversity yields to completeness.
        for candidate in overflow {
            if picked.len() == slide_count {
                break;
            }
            picked.push(candidate);
        }

        picked
    }
}

/// Title slides open the deck; everything else stays in score order.
fn order_slides(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        let a_title = a.kind == SlideKind::Title;
        let b_title = b.kind == SlideKind::Title;
        b_title.cmp(&a_title).then_with(|| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::StubScorer;

    fn candidate(id: &str, source: &str, score: f32, kind: SlideKind) -> Candidate {
        Candidate {
            slide_id: id.to_string(),
            source_id: source.to_string(),
            ordinal: 0,
            title: format!("Slide {}", id),
            body: format!("Body of {}", id),
            kind,
            score,
            rationale: "test".to_string(),
            action: CandidateAction::from_score(score),
            approved_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn request(slide_count: usize) -> GenerationRequest {
        GenerationRequest {
            topic: "Payments deck".to_string(),
            customer: None,
            industry: None,
            audience: None,
            style: Some("minimal".to_string()),
            slide_count,
            requirements: vec![],
        }
    }

    fn assembler(share: f32) -> Assembler {
        Assembler::new(Arc::new(StubScorer::new(0.5)), share)
    }

    #[test]
    fn test_title_slides_open_the_deck() {
        let artifact = assembler(1.0).assemble(
            &request(3),
            vec![
                candidate("a", "s1", 0.9, SlideKind::Content),
                candidate("b", "s1", 0.7, SlideKind::Title),
                candidate("c", "s1", 0.8, SlideKind::Content),
            ],
        );

        assert_eq!(artifact.slides[0].slide_id, "b");
        assert_eq!(artifact.slides[1].slide_id, "a");
        assert_eq!(artifact.slides[2].slide_id, "c");
    }

    #[test]
    fn test_source_cap_spreads_across_sources() {
        // Cap at 50% of a 4-slide deck: two per source.
        let artifact = assembler(0.5).assemble(
            &request(4),
            vec![
                candidate("a1", "s1", 0.95, SlideKind::Content),
                candidate("a2", "s1", 0.94, SlideKind::Content),
                candidate("a3", "s1", 0.93, SlideKind::Content),
                candidate("b1", "s2", 0.5, SlideKind::Content),
                candidate("b2", "s2", 0.45, SlideKind::Content),
            ],
        );

        let from_s1 = artifact
            .slides
            .iter()
            .filter(|s| s.source_id == "s1")
            .count();
        assert_eq!(from_s1, 2);
        assert_eq!(artifact.slides.len(), 4);
    }

    #[test]
    fn test_cap_refills_when_short() {
        // Only one source exists; the cap must not leave seats empty.
        let artifact = assembler(0.5).assemble(
            &request(3),
            vec![
                candidate("a1", "s1", 0.9, SlideKind::Content),
                candidate("a2", "s1", 0.8, SlideKind::Content),
                candidate("a3", "s1", 0.7, SlideKind::Content),
            ],
        );
        assert_eq!(artifact.slides.len(), 3);
    }

    #[test]
    fn test_copy_exact_keeps_body_verbatim() {
        let artifact = assembler(1.0).assemble(
            &request(2),
            vec![
                candidate("exact", "s1", 0.9, SlideKind::Content),
                candidate("adapted", "s1", 0.65, SlideKind::Content),
            ],
        );

        assert_eq!(artifact.slides[0].action, CandidateAction::CopyExact);
        assert_eq!(artifact.slides[0].content, "Body of exact");
        assert_eq!(artifact.slides[1].action, CandidateAction::Enhance);
        assert_eq!(artifact.slides[1].content, "[enhanced] Body of adapted");
    }

    #[test]
    fn test_enhance_failure_ships_original_body() {
        let assembler = Assembler::new(
            Arc::new(StubScorer::new(0.5).failing_first(usize::MAX)),
            1.0,
        );
        let artifact = assembler.assemble(
            &request(1),
            vec![candidate("a", "s1", 0.65, SlideKind::Content)],
        );
        assert_eq!(artifact.slides[0].content, "Body of a");
    }

    #[test]
    fn test_artifact_metadata() {
        let artifact = assembler(1.0).assemble(
            &request(1),
            vec![candidate("a", "s1", 0.9, SlideKind::Content)],
        );
        assert_eq!(artifact.title, "Payments deck");
        assert_eq!(artifact.style.as_deref(), Some("minimal"));
        assert!(!artifact.id.is_empty());
    }
}
