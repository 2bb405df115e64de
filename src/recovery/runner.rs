//! Breaker-guarded retry loop around a single stage.

use super::{AttemptRecord, RecoveryDecision, RecoveryRequest, RecoveryStage};
use crate::circuit::CircuitBreakerRegistry;
use crate::errors::GateResult;
use crate::stage::{ExecutionStage, StageContext, StageResult};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// Result of running a stage through [`RetryingExecutor::run`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryOutcome {
    /// Last result produced by the stage, if it ran at all.
    pub result: Option<StageResult>,
    /// Number of times the stage was executed.
    pub attempts: u32,
    /// Recovery decision for the final failure; `None` on success.
    pub decision: Option<RecoveryDecision>,
    /// True when the run was cut short by an open circuit.
    pub breaker_open: bool,
}

impl RetryOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.as_ref().is_some_and(|r| r.success)
    }

    pub fn escalated(&self) -> bool {
        self.decision.as_ref().is_some_and(|d| d.escalated)
    }
}

/// Runs stages with retry, recovery, and a per-stage circuit breaker.
pub struct RetryingExecutor {
    breakers: Arc<CircuitBreakerRegistry>,
    recovery: RecoveryStage,
}

impl RetryingExecutor {
    pub fn new(breakers: Arc<CircuitBreakerRegistry>, recovery: RecoveryStage) -> Self {
        Self { breakers, recovery }
    }

    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    /// Execute `stage` until it succeeds, recovery escalates, or the stage's
    /// breaker refuses further calls.
    ///
    /// A stage that returns `Err` (an unimplemented contract, a rejected id)
    /// aborts the run immediately; those are not retried, but they still
    /// count as a failure on the stage's breaker.
    pub async fn run(
        &self,
        stage: &dyn ExecutionStage,
        context: &StageContext,
    ) -> GateResult<RetryOutcome> {
        let stage_id = stage.stage_id().to_string();
        let breaker = self.breakers.breaker(&stage_id);
        let max_retries = self.recovery.max_retries();
        let mut attempts = 0u32;
        let mut history: Vec<AttemptRecord> = Vec::new();
        let mut last_result: Option<StageResult> = None;

        loop {
            if !breaker.is_allowed() {
                let error = last_result
                    .as_ref()
                    .and_then(|r| r.first_error())
                    .unwrap_or("dependency unavailable")
                    .to_string();
                let request = RecoveryRequest::new(&stage_id, &error, attempts)
                    .with_max_retries(max_retries)
                    .with_history(history);
                let decision = self
                    .recovery
                    .escalate(
                        &request,
                        &format!("Circuit breaker for '{}' is open", stage_id),
                    )
                    .await?;
                return Ok(RetryOutcome {
                    result: last_result,
                    attempts,
                    decision: Some(decision),
                    breaker_open: true,
                });
            }

            let result = match stage.execute(context).await {
                Ok(result) => result,
                Err(e) => {
                    breaker.record_failure();
                    return Err(e);
                }
            };
            attempts += 1;

            if result.success {
                breaker.record_success();
                return Ok(RetryOutcome {
                    result: Some(result),
                    attempts,
                    decision: None,
                    breaker_open: false,
                });
            }

            breaker.record_failure();
            let error = result
                .first_error()
                .unwrap_or("stage reported failure")
                .to_string();
            history.push(AttemptRecord {
                attempt: attempts,
                error: error.clone(),
                timestamp: Utc::now(),
                duration_ms: result.duration_ms,
            });

            let request = RecoveryRequest::new(&stage_id, &error, attempts)
                .with_max_retries(max_retries)
                .with_history(history.clone());
            let decision = self.recovery.decide(&request).await?;
            last_result = Some(result);

            if !decision.should_retry {
                return Ok(RetryOutcome {
                    result: last_result,
                    attempts,
                    decision: Some(decision),
                    breaker_open: false,
                });
            }
            tokio::task::yield_now().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{BreakerState, CircuitBreakerConfig};
    use crate::errors::GateError;
    use crate::stage::StageRecorder;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::tempdir;

    /// Fails the first `failures` calls, then succeeds.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ExecutionStage for Flaky {
        fn stage_id(&self) -> &str {
            "flaky"
        }

        async fn execute(&self, _context: &StageContext) -> GateResult<StageResult> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let mut recorder = StageRecorder::new("flaky");
            if call < self.failures {
                recorder.fail(format!("transient failure #{}", call + 1));
                Ok(recorder.finish(false))
            } else {
                Ok(recorder.finish(true))
            }
        }
    }

    struct Unimplemented;

    #[async_trait]
    impl ExecutionStage for Unimplemented {
        fn stage_id(&self) -> &str {
            "unimplemented"
        }
    }

    /// Errors on the first call, then succeeds.
    struct ErrThenOk {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ExecutionStage for ErrThenOk {
        fn stage_id(&self) -> &str {
            "io-bound"
        }

        async fn execute(&self, _context: &StageContext) -> GateResult<StageResult> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(GateError::Other(anyhow::anyhow!("transient io")));
            }
            Ok(StageRecorder::new("io-bound").finish(true))
        }
    }

    fn executor(
        dir: &std::path::Path,
        breaker: CircuitBreakerConfig,
        retries: u32,
    ) -> RetryingExecutor {
        RetryingExecutor::new(
            Arc::new(CircuitBreakerRegistry::new(breaker)),
            RecoveryStage::new(dir).with_max_retries(retries),
        )
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let dir = tempdir().unwrap();
        let exec = executor(dir.path(), CircuitBreakerConfig::default(), 3);
        let outcome = exec.run(&Flaky::new(2), &StageContext::new()).await.unwrap();

        assert!(outcome.succeeded());
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.decision.is_none());
        assert_eq!(exec.breakers().breaker("flaky").state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn escalates_when_retries_exhausted() {
        let dir = tempdir().unwrap();
        let exec = executor(dir.path(), CircuitBreakerConfig::default(), 3);
        let outcome = exec.run(&Flaky::new(10), &StageContext::new()).await.unwrap();

        assert!(!outcome.succeeded());
        assert!(outcome.escalated());
        assert!(!outcome.breaker_open);
        assert_eq!(outcome.attempts, 3);

        let path = outcome.decision.unwrap().report_path.unwrap();
        let report = RecoveryStage::load_report(&path).unwrap();
        assert_eq!(report.history.len(), 3);
        assert_eq!(report.error, "transient failure #3");
    }

    #[tokio::test]
    async fn open_breaker_short_circuits_before_retry_budget() {
        let dir = tempdir().unwrap();
        let exec = executor(
            dir.path(),
            CircuitBreakerConfig::default().with_failure_threshold(2),
            10,
        );
        let outcome = exec.run(&Flaky::new(100), &StageContext::new()).await.unwrap();

        assert!(outcome.breaker_open);
        assert!(outcome.escalated());
        assert_eq!(outcome.attempts, 2);
        assert_eq!(exec.breakers().breaker("flaky").state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn defects_are_not_retried() {
        let dir = tempdir().unwrap();
        let exec = executor(dir.path(), CircuitBreakerConfig::default(), 3);
        let err = exec
            .run(&Unimplemented, &StageContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::UnimplementedStage { .. }));
    }

    #[tokio::test]
    async fn stage_error_during_half_open_probe_reopens_breaker() {
        let dir = tempdir().unwrap();
        let exec = executor(
            dir.path(),
            CircuitBreakerConfig::default()
                .with_failure_threshold(1)
                .with_success_threshold(1)
                .with_reset_timeout(std::time::Duration::from_millis(50)),
            3,
        );
        let stage = ErrThenOk {
            calls: AtomicU32::new(0),
        };
        let breaker = exec.breakers().breaker("io-bound");
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        let err = exec.run(&stage, &StageContext::new()).await.unwrap_err();
        assert!(err.to_string().contains("transient io"));
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.stats().probe_in_flight);
        assert_eq!(breaker.stats().total_trips, 2);

        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        let outcome = exec.run(&stage, &StageContext::new()).await.unwrap();
        assert!(outcome.succeeded());
        assert!(!outcome.breaker_open);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn stage_error_counts_against_closed_breaker() {
        let dir = tempdir().unwrap();
        let exec = executor(dir.path(), CircuitBreakerConfig::default(), 3);
        exec.run(&Unimplemented, &StageContext::new())
            .await
            .unwrap_err();
        let stats = exec.breakers().breaker("unimplemented").stats();
        assert_eq!(stats.failure_count, 1);
    }
}
