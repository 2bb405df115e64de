//! Keyed collection of circuit breakers, one per protected operation.

use super::{CircuitBreaker, CircuitBreakerConfig, CircuitStats};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Hands out a shared breaker per key (typically a stage id).
///
/// The registry is an ordinary value: callers construct it and pass it to
/// whatever needs breakers, so tests get fresh state by building a new one.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Get the breaker for `key`, creating it on first use.
    pub fn breaker(&self, key: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self
            .breakers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(
            breakers
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::named(key, self.config))),
        )
    }

    /// Snapshot every known breaker, ordered by key.
    pub fn stats(&self) -> BTreeMap<String, CircuitStats> {
        let breakers = self
            .breakers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        breakers
            .iter()
            .map(|(key, breaker)| (key.clone(), breaker.stats()))
            .collect()
    }

    pub fn reset_all(&self) {
        let breakers = self
            .breakers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for breaker in breakers.values() {
            breaker.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::BreakerState;

    #[test]
    fn same_key_returns_same_breaker() {
        let registry = CircuitBreakerRegistry::default();
        let a = registry.breaker("layer1-checks");
        let b = registry.breaker("layer1-checks");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn keys_are_isolated() {
        let registry =
            CircuitBreakerRegistry::new(CircuitBreakerConfig::default().with_failure_threshold(1));
        registry.breaker("lint").record_failure();
        assert_eq!(registry.breaker("lint").state(), BreakerState::Open);
        assert_eq!(registry.breaker("tests").state(), BreakerState::Closed);

        let stats = registry.stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats["lint"].total_trips, 1);
    }

    #[test]
    fn reset_all_closes_every_breaker() {
        let registry =
            CircuitBreakerRegistry::new(CircuitBreakerConfig::default().with_failure_threshold(1));
        registry.breaker("a").record_failure();
        registry.breaker("b").record_failure();
        registry.reset_all();
        assert_eq!(registry.breaker("a").state(), BreakerState::Closed);
        assert_eq!(registry.breaker("b").state(), BreakerState::Closed);
    }
}
