use super::error::EngineError;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Runs `op` until it succeeds, fails permanently, or runs out of
    /// attempts. Exhaustion is reported as [`EngineError::Exhausted`].
    pub fn run<T>(&self, unit: &str, mut op: impl FnMut() -> Result<T, EngineError>) -> Result<T, EngineError> {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    if attempt >= attempts {
                        return Err(EngineError::Exhausted { unit: unit.to_string(), attempts, last: Box::new(err) });
                    }
                    warn!(unit, attempt, of = attempts, error = %err, "transient failure, retrying");
                    if !self.delay.is_zero() {
                        thread::sleep(self.delay);
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::SourceError;
    use crate::model::GeoType;

    fn transient() -> EngineError {
        EngineError::Source { variable: "v".into(), geotype: GeoType::Tract, source: SourceError::Transient("timeout".into()) }
    }

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy { attempts, delay: Duration::ZERO }
    }

    #[test]
    fn test_recovers_before_attempts_run_out() {
        let mut calls = 0;
        let out = policy(3).run("v@tract", || {
            calls += 1;
            if calls < 3 {
                Err(transient())
            } else {
                Ok(calls)
            }
        });
        assert_eq!(out.unwrap(), 3);
    }

    #[test]
    fn test_gives_up_after_last_attempt() {
        let mut calls = 0;
        let err = policy(3)
            .run("v@tract", || -> Result<(), EngineError> {
                calls += 1;
                Err(transient())
            })
            .unwrap_err();
        assert_eq!(calls, 3);
        assert!(matches!(err, EngineError::Exhausted { attempts: 3, .. }));
    }

    #[test]
    fn test_permanent_errors_are_not_retried() {
        let mut calls = 0;
        let err = policy(3)
            .run("v@tract", || -> Result<(), EngineError> {
                calls += 1;
                Err(EngineError::Pool("boom".into()))
            })
            .unwrap_err();
        assert_eq!(calls, 1);
        assert!(matches!(err, EngineError::Pool(_)));
    }
}
