use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BreakerStatus {
    Closed,
    HalfOpen,
    Open,
}

#[derive(Debug)]
struct BreakerState {
    failures: u32,
    opened_at: Option<Instant>,
    status: BreakerStatus,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            failures: 0,
            opened_at: None,
            status: BreakerStatus::Closed,
        }
    }
}

/// Per-adapter failure tracking. Adapters that keep timing out or erroring
/// are skipped entirely until a cooldown elapses; one probe call is then let
/// through before the circuit closes again.
///
/// Only adapter-level failures count. An adapter returning zero results is a
/// normal success.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    failure_threshold: u32,
    cooldown: Duration,
    states: RwLock<HashMap<String, Mutex<BreakerState>>>,
}

impl CircuitBreakerRegistry {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown,
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Whether the adapter may run right now. Transitions an expired open
    /// circuit to half-open and admits exactly one probe call for it.
    pub fn allows(&self, adapter: &str) -> bool {
        self.with_state(adapter, |state| match state.status {
            BreakerStatus::Closed => true,
            BreakerStatus::HalfOpen => false,
            BreakerStatus::Open => {
                let expired = state
                    .opened_at
                    .is_some_and(|at| at.elapsed() >= self.cooldown);
                if expired {
                    state.status = BreakerStatus::HalfOpen;
                    true
                } else {
                    false
                }
            }
        })
    }

    pub fn record_success(&self, adapter: &str) {
        self.with_state(adapter, |state| {
            if state.status != BreakerStatus::Closed {
                tracing::info!("Circuit for {adapter} closed again");
            }
            state.failures = 0;
            state.opened_at = None;
            state.status = BreakerStatus::Closed;
        });
    }

    pub fn record_failure(&self, adapter: &str) {
        let threshold = self.failure_threshold;
        self.with_state(adapter, |state| match state.status {
            BreakerStatus::HalfOpen => {
                state.opened_at = Some(Instant::now());
                state.status = BreakerStatus::Open;
                tracing::warn!("Probe call failed, circuit for {adapter} re-opened");
            }
            BreakerStatus::Open => {}
            BreakerStatus::Closed => {
                state.failures += 1;
                if state.failures >= threshold {
                    state.opened_at = Some(Instant::now());
                    state.status = BreakerStatus::Open;
                    tracing::warn!(
                        failures = state.failures,
                        "Circuit for {adapter} opened"
                    );
                }
            }
        });
    }

    pub fn status(&self, adapter: &str) -> BreakerStatus {
        self.with_state(adapter, |state| state.status)
    }

    fn with_state<R>(&self, adapter: &str, f: impl FnOnce(&mut BreakerState) -> R) -> R {
        {
            let states = self.states.read().unwrap();
            if let Some(state) = states.get(adapter) {
                let mut guard = state.lock().unwrap();
                return f(&mut guard);
            }
        }
        let mut states = self.states.write().unwrap();
        let state = states
            .entry(adapter.to_string())
            .or_insert_with(|| Mutex::new(BreakerState::new()));
        let mut guard = state.lock().unwrap();
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_exactly_at_threshold() {
        let registry = CircuitBreakerRegistry::new(3, Duration::from_secs(60));
        registry.record_failure("a");
        registry.record_failure("a");
        assert!(registry.allows("a"));
        registry.record_failure("a");
        assert!(!registry.allows("a"));
        assert_eq!(registry.status("a"), BreakerStatus::Open);
    }

    #[test]
    fn success_resets_counter() {
        let registry = CircuitBreakerRegistry::new(2, Duration::from_secs(60));
        registry.record_failure("a");
        registry.record_success("a");
        registry.record_failure("a");
        assert!(registry.allows("a"));
    }

    #[test]
    fn cooldown_admits_single_probe() {
        let registry = CircuitBreakerRegistry::new(1, Duration::from_millis(0));
        registry.record_failure("a");
        // Cooldown of zero has already elapsed: one probe is let through.
        assert!(registry.allows("a"));
        assert_eq!(registry.status("a"), BreakerStatus::HalfOpen);
        // No second probe before the first resolves.
        assert!(!registry.allows("a"));
    }

    #[test]
    fn half_open_failure_reopens() {
        let registry = CircuitBreakerRegistry::new(1, Duration::from_millis(0));
        registry.record_failure("a");
        assert!(registry.allows("a"));
        registry.record_failure("a");
        assert_eq!(registry.status("a"), BreakerStatus::Open);
    }

    #[test]
    fn half_open_success_closes() {
        let registry = CircuitBreakerRegistry::new(1, Duration::from_millis(0));
        registry.record_failure("a");
        assert!(registry.allows("a"));
        registry.record_success("a");
        assert_eq!(registry.status("a"), BreakerStatus::Closed);
        assert!(registry.allows("a"));
    }

    #[test]
    fn adapters_are_independent() {
        let registry = CircuitBreakerRegistry::new(1, Duration::from_secs(60));
        registry.record_failure("a");
        assert!(!registry.allows("a"));
        assert!(registry.allows("b"));
    }

    #[test]
    fn open_circuit_holds_before_cooldown() {
        let registry = CircuitBreakerRegistry::new(1, Duration::from_secs(3600));
        registry.record_failure("a");
        assert!(!registry.allows("a"));
        assert!(!registry.allows("a"));
        assert_eq!(registry.status("a"), BreakerStatus::Open);
    }
}
