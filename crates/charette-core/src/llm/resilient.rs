//! Retrying execution wrapper around an unreliable text-generation call.
//!
//! [`ResilientExecutor`] wraps any [`TextGenerator`] with bounded retries and
//! classified backoff: rate limits and generic errors wait `2^attempt` seconds
//! plus jitter, provider overload waits `3^attempt` seconds plus heavier
//! jitter to ride out congestion. A successful call whose text is degenerate
//! (blank, or carrying an error token) is retried on the same budget.
//! The executor never raises to its caller -- exhaustion returns the last
//! observed value as a tagged [`GenerationOutcome`].
//!
//! [`HybridExecutor`] layers a two-tier fallback on top: the direct API
//! client is tried first, and only if it fails does the higher-level
//! framework client run, itself under the same retry policy.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use charette_types::llm::{GenerationOutcome, GenerationRequest, LlmError};

use super::generator::TextGenerator;

/// Default retry budget per tier.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

// ---------------------------------------------------------------------------
// Sleeper
// ---------------------------------------------------------------------------

/// Injection point for backoff waits, so tests can count sleeps without
/// actually waiting.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Which backoff schedule a failure maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackoffClass {
    Generic,
    RateLimited,
    Overloaded,
}

impl BackoffClass {
    fn for_error(err: &LlmError) -> Self {
        match err {
            LlmError::RateLimited { .. } => BackoffClass::RateLimited,
            LlmError::Overloaded(_) => BackoffClass::Overloaded,
            _ => BackoffClass::Generic,
        }
    }

    /// Wait before the retry following 0-indexed `attempt`.
    ///
    /// Generic and rate-limited: `2^attempt + uniform(0, 1)` seconds.
    /// Overloaded: `3^attempt + uniform(1, 3)` seconds.
    fn delay(self, attempt: u32) -> Duration {
        let mut rng = rand::rng();
        let secs = match self {
            BackoffClass::Generic | BackoffClass::RateLimited => {
                2f64.powi(attempt as i32) + rng.random_range(0.0..1.0)
            }
            BackoffClass::Overloaded => 3f64.powi(attempt as i32) + rng.random_range(1.0..3.0),
        };
        Duration::from_secs_f64(secs)
    }
}

/// A successful call whose text is unusable: blank, or carrying an error
/// token the provider sometimes embeds in an otherwise-200 response.
fn is_degenerate(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed.to_lowercase().contains("error")
}

// ---------------------------------------------------------------------------
// ResilientExecutor
// ---------------------------------------------------------------------------

/// Uniform interface over single-tier and hybrid executors; the session
/// runner is generic over this.
pub trait ResilientGeneration: Send + Sync {
    fn execute(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = GenerationOutcome> + Send;
}

/// Bounded-retry wrapper around one [`TextGenerator`].
pub struct ResilientExecutor<G, S = TokioSleeper> {
    generator: G,
    max_retries: u32,
    sleeper: S,
}

impl<G: TextGenerator> ResilientExecutor<G> {
    /// Wrap a generator with the default retry budget and tokio sleeps.
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            max_retries: DEFAULT_MAX_RETRIES,
            sleeper: TokioSleeper,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

impl<G: TextGenerator, S: Sleeper> ResilientExecutor<G, S> {
    /// Full constructor with an injected sleeper (used by tests).
    pub fn with_sleeper(generator: G, max_retries: u32, sleeper: S) -> Self {
        Self {
            generator,
            max_retries,
            sleeper,
        }
    }

    /// Run the request with retries; never raises.
    ///
    /// Returns `Ok` on the first usable answer. Non-transient errors are
    /// `Fatal` immediately. On exhaustion the last observed value comes back
    /// verbatim: `Retryable` with the final degenerate text, or `Fatal` with
    /// the final error.
    pub async fn execute(&self, request: &GenerationRequest) -> GenerationOutcome {
        let mut last = GenerationOutcome::Fatal {
            reason: "no generation attempts were made".to_string(),
        };

        for attempt in 0..self.max_retries {
            let class = match self.generator.generate(request).await {
                Ok(text) if !is_degenerate(&text) => {
                    return GenerationOutcome::Ok { text };
                }
                Ok(text) => {
                    tracing::warn!(
                        provider = self.generator.name(),
                        attempt,
                        "degenerate answer, retrying"
                    );
                    last = GenerationOutcome::Retryable { last_text: text };
                    BackoffClass::Generic
                }
                Err(err) if !err.is_transient() => {
                    tracing::error!(
                        provider = self.generator.name(),
                        error = %err,
                        "non-retryable error"
                    );
                    return GenerationOutcome::Fatal {
                        reason: err.to_string(),
                    };
                }
                Err(err) => {
                    let class = BackoffClass::for_error(&err);
                    last = GenerationOutcome::Fatal {
                        reason: err.to_string(),
                    };
                    class
                }
            };

            if attempt + 1 < self.max_retries {
                let wait = class.delay(attempt);
                tracing::warn!(
                    provider = self.generator.name(),
                    attempt,
                    wait_secs = wait.as_secs_f64(),
                    "transient failure, backing off before retry"
                );
                self.sleeper.sleep(wait).await;
            }
        }

        last
    }
}

impl<G: TextGenerator, S: Sleeper> ResilientGeneration for ResilientExecutor<G, S> {
    fn execute(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = GenerationOutcome> + Send {
        ResilientExecutor::execute(self, request)
    }
}

// ---------------------------------------------------------------------------
// HybridExecutor
// ---------------------------------------------------------------------------

/// Two-tier execution: direct API client first, framework client as
/// fallback, each under its own retry policy.
///
/// The fallback is a resilience layer against provider-client bugs
/// independent of network retries -- a failure in the direct path (of any
/// kind, including exhausted retries) hands the request to the second tier.
pub struct HybridExecutor<P, F, S = TokioSleeper> {
    primary: ResilientExecutor<P, S>,
    fallback: ResilientExecutor<F, S>,
}

impl<P, F, S> HybridExecutor<P, F, S>
where
    P: TextGenerator,
    F: TextGenerator,
    S: Sleeper,
{
    pub fn new(primary: ResilientExecutor<P, S>, fallback: ResilientExecutor<F, S>) -> Self {
        Self { primary, fallback }
    }

    /// Run through the primary tier; on any failure, run the fallback tier
    /// and return its outcome.
    pub async fn execute(&self, request: &GenerationRequest) -> GenerationOutcome {
        let outcome = self.primary.execute(request).await;
        if outcome.is_ok() {
            return outcome;
        }

        tracing::warn!(
            reason = outcome.failure_reason().as_deref().unwrap_or("unknown"),
            "direct client failed, falling back to framework client"
        );
        self.fallback.execute(request).await
    }
}

impl<P, F, S> ResilientGeneration for HybridExecutor<P, F, S>
where
    P: TextGenerator,
    F: TextGenerator,
    S: Sleeper,
{
    fn execute(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = GenerationOutcome> + Send {
        HybridExecutor::execute(self, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    // ---- Mock generator and sleeper ----

    #[derive(Clone)]
    enum Script {
        Text(String),
        RateLimited,
        Overloaded,
        Generic,
        Auth,
    }

    struct MockGenerator {
        script: Mutex<VecDeque<Script>>,
        calls: AtomicUsize,
    }

    impl MockGenerator {
        fn new(script: Vec<Script>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TextGenerator for MockGenerator {
        fn name(&self) -> &str {
            "mock"
        }

        fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> impl Future<Output = Result<String, LlmError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            async move {
                match next {
                    Some(Script::Text(text)) => Ok(text),
                    Some(Script::RateLimited) => Err(LlmError::RateLimited {
                        retry_after_ms: None,
                    }),
                    Some(Script::Overloaded) => Err(LlmError::Overloaded("529".into())),
                    Some(Script::Generic) => Err(LlmError::Provider {
                        message: "500 Internal Server Error".into(),
                    }),
                    Some(Script::Auth) => Err(LlmError::AuthenticationFailed),
                    None => panic!("mock generator called past end of script"),
                }
            }
        }
    }

    /// Records every requested wait instead of sleeping.
    #[derive(Clone, Default)]
    struct RecordingSleeper {
        waits: Arc<Mutex<Vec<Duration>>>,
    }

    impl RecordingSleeper {
        fn waits(&self) -> Vec<Duration> {
            self.waits.lock().unwrap().clone()
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
            self.waits.lock().unwrap().push(duration);
            std::future::ready(())
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            model: "claude-sonnet-4-20250514".to_string(),
            prompt: "Analyze the site.".to_string(),
            system: None,
            max_tokens: 8_192,
            temperature: None,
        }
    }

    fn executor(
        script: Vec<Script>,
        sleeper: &RecordingSleeper,
    ) -> ResilientExecutor<MockGenerator, RecordingSleeper> {
        ResilientExecutor::with_sleeper(MockGenerator::new(script), 3, sleeper.clone())
    }

    const GOOD: &str = "A thorough analysis of the site and its constraints.";

    // ---- retry cadence ----

    #[tokio::test]
    async fn test_success_on_first_attempt_no_sleeps() {
        let sleeper = RecordingSleeper::default();
        let exec = executor(vec![Script::Text(GOOD.into())], &sleeper);

        let outcome = exec.execute(&request()).await;
        assert_eq!(outcome.text(), Some(GOOD));
        assert!(sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limited_twice_then_success() {
        let sleeper = RecordingSleeper::default();
        let exec = executor(
            vec![
                Script::RateLimited,
                Script::RateLimited,
                Script::Text(GOOD.into()),
            ],
            &sleeper,
        );

        let outcome = exec.execute(&request()).await;
        assert_eq!(outcome.text(), Some(GOOD));

        // Exactly two backoff sleeps: 2^0 + U(0,1), then 2^1 + U(0,1).
        let waits = sleeper.waits();
        assert_eq!(waits.len(), 2);
        assert!(waits[0].as_secs_f64() >= 1.0 && waits[0].as_secs_f64() < 2.0);
        assert!(waits[1].as_secs_f64() >= 2.0 && waits[1].as_secs_f64() < 3.0);
    }

    #[tokio::test]
    async fn test_overloaded_uses_longer_backoff() {
        let sleeper = RecordingSleeper::default();
        let exec = executor(vec![Script::Overloaded, Script::Text(GOOD.into())], &sleeper);

        let outcome = exec.execute(&request()).await;
        assert!(outcome.is_ok());

        // 3^0 + U(1,3) seconds.
        let waits = sleeper.waits();
        assert_eq!(waits.len(), 1);
        assert!(waits[0].as_secs_f64() >= 2.0 && waits[0].as_secs_f64() < 4.0);
    }

    #[tokio::test]
    async fn test_persistent_generic_error_exhausts_to_fatal() {
        let sleeper = RecordingSleeper::default();
        let exec = executor(
            vec![Script::Generic, Script::Generic, Script::Generic],
            &sleeper,
        );

        let outcome = exec.execute(&request()).await;
        match outcome {
            GenerationOutcome::Fatal { reason } => {
                assert!(reason.contains("500 Internal Server Error"));
            }
            other => panic!("expected Fatal, got {other:?}"),
        }
        // Three attempts, sleeps only between them.
        assert_eq!(sleeper.waits().len(), 2);
    }

    #[tokio::test]
    async fn test_exact_attempt_count_on_exhaustion() {
        let sleeper = RecordingSleeper::default();
        let generator = MockGenerator::new(vec![Script::Generic, Script::Generic, Script::Generic]);
        let exec = ResilientExecutor::with_sleeper(generator, 3, sleeper.clone());

        let _ = exec.execute(&request()).await;
        assert_eq!(exec.generator.calls(), 3);
    }

    // ---- degenerate answers ----

    #[tokio::test]
    async fn test_degenerate_blank_answer_retried() {
        let sleeper = RecordingSleeper::default();
        let exec = executor(
            vec![Script::Text("   ".into()), Script::Text(GOOD.into())],
            &sleeper,
        );

        let outcome = exec.execute(&request()).await;
        assert_eq!(outcome.text(), Some(GOOD));
        assert_eq!(sleeper.waits().len(), 1);
    }

    #[tokio::test]
    async fn test_answer_carrying_error_token_retried() {
        let sleeper = RecordingSleeper::default();
        let exec = executor(
            vec![
                Script::Text("Error: upstream returned nothing".into()),
                Script::Text(GOOD.into()),
            ],
            &sleeper,
        );

        let outcome = exec.execute(&request()).await;
        assert_eq!(outcome.text(), Some(GOOD));
    }

    #[tokio::test]
    async fn test_exhausted_degenerate_returns_last_text_verbatim() {
        let sleeper = RecordingSleeper::default();
        let exec = executor(
            vec![
                Script::Text("".into()),
                Script::Text(" ".into()),
                Script::Text("error 42".into()),
            ],
            &sleeper,
        );

        let outcome = exec.execute(&request()).await;
        assert_eq!(
            outcome,
            GenerationOutcome::Retryable {
                last_text: "error 42".to_string()
            }
        );
    }

    // ---- non-retryable errors ----

    #[tokio::test]
    async fn test_auth_error_is_fatal_without_retry() {
        let sleeper = RecordingSleeper::default();
        let generator = MockGenerator::new(vec![Script::Auth]);
        let exec = ResilientExecutor::with_sleeper(generator, 3, sleeper.clone());

        let outcome = exec.execute(&request()).await;
        assert!(matches!(outcome, GenerationOutcome::Fatal { .. }));
        assert_eq!(exec.generator.calls(), 1);
        assert!(sleeper.waits().is_empty());
    }

    // ---- hybrid fallback ----

    #[tokio::test]
    async fn test_hybrid_primary_success_skips_fallback() {
        let sleeper = RecordingSleeper::default();
        let primary = executor(vec![Script::Text(GOOD.into())], &sleeper);
        let fallback = executor(vec![], &sleeper);
        let hybrid = HybridExecutor::new(primary, fallback);

        let outcome = hybrid.execute(&request()).await;
        assert_eq!(outcome.text(), Some(GOOD));
        assert_eq!(hybrid.fallback.generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_hybrid_falls_back_after_primary_exhaustion() {
        let sleeper = RecordingSleeper::default();
        let primary = executor(
            vec![Script::Generic, Script::Generic, Script::Generic],
            &sleeper,
        );
        let fallback = executor(vec![Script::Text(GOOD.into())], &sleeper);
        let hybrid = HybridExecutor::new(primary, fallback);

        let outcome = hybrid.execute(&request()).await;
        assert_eq!(outcome.text(), Some(GOOD));
        assert_eq!(hybrid.primary.generator.calls(), 3);
    }

    #[tokio::test]
    async fn test_hybrid_falls_back_on_fatal_primary_error() {
        let sleeper = RecordingSleeper::default();
        let primary = executor(vec![Script::Auth], &sleeper);
        let fallback = executor(vec![Script::Text(GOOD.into())], &sleeper);
        let hybrid = HybridExecutor::new(primary, fallback);

        let outcome = hybrid.execute(&request()).await;
        assert_eq!(outcome.text(), Some(GOOD));
    }

    #[tokio::test]
    async fn test_hybrid_returns_fallback_outcome_when_both_fail() {
        let sleeper = RecordingSleeper::default();
        let primary = executor(vec![Script::Auth], &sleeper);
        let fallback = executor(vec![Script::Auth], &sleeper);
        let hybrid = HybridExecutor::new(primary, fallback);

        let outcome = hybrid.execute(&request()).await;
        assert!(matches!(outcome, GenerationOutcome::Fatal { .. }));
    }
}
