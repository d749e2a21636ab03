//! Scripted scorer for tests: fixed scores per text prefix, optional
//! failure injection. Lives in the main tree so integration tests can use it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::ScorerError;
use crate::scoring::{RelevanceScorer, ScoreContext, Scored};

#[derive(Default)]
pub struct StubScorer {
    scripted: Mutex<Vec<(String, f32)>>,
    default_score: f32,
    /// Number of leading calls that fail before the scorer recovers.
    fail_first: AtomicUsize,
    calls: AtomicUsize,
}

impl StubScorer {
    pub fn new(default_score: f32) -> Self {
        Self {
            scripted: Mutex::new(Vec::new()),
            default_score,
            fail_first: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns `score` for any text containing `needle`.
    pub fn with_score(self, needle: &str, score: f32) -> Self {
        if let Ok(mut scripted) = self.scripted.lock() {
            scripted.push((needle.to_string(), score));
        }
        self
    }

    /// Makes the first `n` score calls fail with `Unavailable`.
    pub fn failing_first(self, n: usize) -> Self {
        self.fail_first.store(n, Ordering::SeqCst);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RelevanceScorer for StubScorer {
    fn score(&self, text: &str, _ctx: &ScoreContext) -> Result<Scored, ScorerError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first.load(Ordering::SeqCst) {
            return Err(ScorerError::Unavailable("scripted failure".to_string()));
        }

        let scripted = self
            .scripted
            .lock()
            .map_err(|_| ScorerError::Unavailable("stub lock poisoned".to_string()))?;
        let score = scripted
            .iter()
            .find(|(needle, _)| text.contains(needle))
            .map(|(_, s)| *s)
            .unwrap_or(self.default_score);

        Ok(Scored {
            score,
            rationale: "scripted".to_string(),
        })
    }

    fn enhance(&self, text: &str, _ctx: &ScoreContext) -> Result<String, ScorerError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first.load(Ordering::SeqCst) {
            return Err(ScorerError::Unavailable("scripted failure".to_string()));
        }
        Ok(format!("[enhanced] {}", text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_scores() {
        let stub = StubScorer::new(0.1).with_score("payments", 0.9);
        let ctx = ScoreContext::default();

        assert_eq!(stub.score("about payments", &ctx).unwrap().score, 0.9);
        assert_eq!(stub.score("unrelated", &ctx).unwrap().score, 0.1);
        assert_eq!(stub.call_count(), 2);
    }

    #[test]
    fn test_failure_injection() {
        let stub = StubScorer::new(0.5).failing_first(2);
        let ctx = ScoreContext::default();

        assert!(stub.score("a", &ctx).is_err());
        assert!(stub.score("b", &ctx).is_err());
        assert!(stub.score("c", &ctx).is_ok());
    }
}
