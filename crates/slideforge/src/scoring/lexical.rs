//! Deterministic lexical scorer: weighted token overlap between slide text
//! and the request context. No network, no model files, same verdict every
//! run. This is the default scorer; a model-backed implementation can be
//! swapped in behind the same trait.

use std::collections::HashSet;

use crate::error::ScorerError;
use crate::scoring::embedding::tokenize;
use crate::scoring::{clamp_score, RelevanceScorer, ScoreContext, Scored};

pub struct LexicalScorer;

impl LexicalScorer {
    pub fn new() -> Self {
        Self
    }

    fn context_terms(ctx: &ScoreContext) -> Vec<(String, f32)> {
        let mut terms = Vec::new();
        // Topic tokens dominate; the rest of the context refines.
        for t in tokenize(&ctx.topic) {
            terms.push((t, 1.0));
        }
        if let Some(industry) = &ctx.industry {
            for t in tokenize(industry) {
                terms.push((t, 0.6));
            }
        }
        if let Some(customer) = &ctx.customer {
            for t in tokenize(customer) {
                terms.push((t, 0.4));
            }
        }
        if let Some(audience) = &ctx.audience {
            for t in tokenize(audience) {
                terms.push((t, 0.3));
            }
        }
        for req in &ctx.requirements {
            for t in tokenize(req) {
                terms.push((t, 0.5));
            }
        }
        terms
    }
}

impl Default for LexicalScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl RelevanceScorer for LexicalScorer {
    fn score(&self, text: &str, ctx: &ScoreContext) -> Result<Scored, ScorerError> {
        let terms = Self::context_terms(ctx);
        if terms.is_empty() {
            return Ok(Scored {
                score: 0.0,
                rationale: "Empty request context".to_string(),
            });
        }

        let slide_tokens: HashSet<String> = tokenize(text).into_iter().collect();
        let total_weight: f32 = terms.iter().map(|(_, w)| w).sum();

        let mut matched_weight = 0.0f32;
        let mut hits: Vec<&str> = Vec::new();
        for (term, weight) in &terms {
            if slide_tokens.contains(term) {
                matched_weight += weight;
                if hits.len() < 5 && !hits.contains(&term.as_str()) {
                    hits.push(term);
                }
            }
        }

        let score = clamp_score(matched_weight / total_weight);
        let rationale = if hits.is_empty() {
            "No overlap with the request".to_string()
        } else {
            format!("Matched terms: {}", hits.join(", "))
        };

        Ok(Scored { score, rationale })
    }

    fn enhance(&self, text: &str, ctx: &ScoreContext) -> Result<String, ScorerError> {
        // Lexical enhancement is a light contextual reframe: prefix the
        // original content with the request it was adapted for.
        let mut framing = ctx.topic.clone();
        if let Some(customer) = &ctx.customer {
            framing = format!("{} for {}", framing, customer);
        }
        Ok(format!("{}\n\n{}", framing, text))
    }
}
