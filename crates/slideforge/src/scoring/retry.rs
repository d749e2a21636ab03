//! Retry decorator for scorers backed by flaky services. Bounded attempts
//! with fixed backoff; `InvalidResponse` is not retried since repeating the
//! same request will not fix a malformed answer.

use std::time::Duration;

use crate::error::ScorerError;
use crate::scoring::{RelevanceScorer, ScoreContext, Scored};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

pub struct RetryScorer<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: RelevanceScorer> RetryScorer<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    fn with_retries<T>(
        &self,
        mut op: impl FnMut() -> Result<T, ScorerError>,
    ) -> Result<T, ScorerError> {
        let mut last_err = ScorerError::Unavailable("no attempts made".to_string());
        for attempt in 1..=self.policy.max_attempts.max(1) {
            match op() {
                Ok(value) => return Ok(value),
                Err(e @ ScorerError::InvalidResponse(_)) => return Err(e),
                Err(e) => {
                    log::warn!(
                        "Scorer attempt {}/{} failed: {}",
                        attempt,
                        self.policy.max_attempts,
                        e
                    );
                    last_err = e;
                    if attempt < self.policy.max_attempts {
                        std::thread::sleep(self.policy.backoff);
                    }
                }
            }
        }
        Err(last_err)
    }
}

impl<S: RelevanceScorer> RelevanceScorer for RetryScorer<S> {
    fn score(&self, text: &str, ctx: &ScoreContext) -> Result<Scored, ScorerError> {
        self.with_retries(|| self.inner.score(text, ctx))
    }

    fn enhance(&self, text: &str, ctx: &ScoreContext) -> Result<String, ScorerError> {
        self.with_retries(|| self.inner.enhance(text, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::StubScorer;

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts: attempts,
            backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_recovers_within_budget() {
        let scorer = RetryScorer::new(StubScorer::new(0.7).failing_first(2), fast_policy(3));
        let scored = scorer.score("text", &ScoreContext::default()).unwrap();
        assert_eq!(scored.score, 0.7);
    }

    #[test]
    fn test_gives_up_after_budget() {
        let stub = StubScorer::new(0.7).failing_first(5);
        let scorer = RetryScorer::new(stub, fast_policy(3));
        assert!(matches!(
            scorer.score("text", &ScoreContext::default()),
            Err(ScorerError::Unavailable(_))
        ));
    }

    struct MalformedScorer;

    impl RelevanceScorer for MalformedScorer {
        fn score(&self, _: &str, _: &ScoreContext) -> Result<Scored, ScorerError> {
            Err(ScorerError::InvalidResponse("not json".to_string()))
        }
        fn enhance(&self, _: &str, _: &ScoreContext) -> Result<String, ScorerError> {
            Err(ScorerError::InvalidResponse("not json".to_string()))
        }
    }

    #[test]
    fn test_invalid_response_not_retried() {
        let scorer = RetryScorer::new(MalformedScorer, fast_policy(3));
        assert!(matches!(
            scorer.score("text", &ScoreContext::default()),
            Err(ScorerError::InvalidResponse(_))
        ));
    }
}
