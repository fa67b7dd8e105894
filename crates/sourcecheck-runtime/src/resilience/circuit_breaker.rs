//! Circuit breaker to stop calling agents that keep failing.
//!
//! When an agent fails repeatedly its circuit opens and subsequent
//! claims go straight to the fallback until the recovery timeout passes.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::humantime_duration;

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,

    /// Time before a trial call is let through
    #[serde(with = "humantime_duration")]
    pub recovery_timeout: Duration,

    /// Trial successes needed to close the circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// State of one agent's circuit.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitState {
    /// Normal operation
    Closed { failures: u32 },

    /// Calls bypass the agent
    Open { opened_at: Instant },

    /// Trial calls decide whether to close again
    HalfOpen { successes: u32 },
}

/// Per-agent circuit breaker.
///
/// Each agent has its own circuit so one flaky agent does not silence
/// the others.
pub struct CircuitBreaker {
    states: RwLock<HashMap<String, CircuitState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Whether calls to `agent` should bypass it and use the fallback.
    pub fn is_open(&self, agent: &str) -> bool {
        let states = self.states.read();
        match states.get(agent) {
            Some(CircuitState::Open { opened_at }) => {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    drop(states);
                    self.transition_to_half_open(agent);
                    false
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    pub fn record_success(&self, agent: &str) {
        let mut states = self.states.write();
        match states.get(agent).cloned() {
            Some(CircuitState::HalfOpen { successes }) => {
                if successes + 1 >= self.config.success_threshold {
                    states.insert(agent.to_string(), CircuitState::Closed { failures: 0 });
                    tracing::info!(agent, "circuit closed after successful recovery");
                } else {
                    states.insert(
                        agent.to_string(),
                        CircuitState::HalfOpen {
                            successes: successes + 1,
                        },
                    );
                }
            }
            Some(CircuitState::Closed { failures }) if failures > 0 => {
                states.insert(agent.to_string(), CircuitState::Closed { failures: 0 });
            }
            _ => {}
        }
    }

    pub fn record_failure(&self, agent: &str) {
        let mut states = self.states.write();
        let failures = match states.get(agent) {
            Some(CircuitState::Closed { failures }) => *failures,
            None => 0,
            Some(CircuitState::HalfOpen { .. }) => {
                states.insert(
                    agent.to_string(),
                    CircuitState::Open {
                        opened_at: Instant::now(),
                    },
                );
                tracing::warn!(agent, "circuit reopened after failed recovery attempt");
                return;
            }
            Some(CircuitState::Open { .. }) => return,
        };

        if failures + 1 >= self.config.failure_threshold {
            states.insert(
                agent.to_string(),
                CircuitState::Open {
                    opened_at: Instant::now(),
                },
            );
            tracing::warn!(agent, failures = failures + 1, "circuit opened after repeated failures");
        } else {
            states.insert(
                agent.to_string(),
                CircuitState::Closed {
                    failures: failures + 1,
                },
            );
        }
    }

    fn transition_to_half_open(&self, agent: &str) {
        let mut states = self.states.write();
        if matches!(states.get(agent), Some(CircuitState::Open { .. })) {
            states.insert(agent.to_string(), CircuitState::HalfOpen { successes: 0 });
            tracing::info!(agent, "circuit half-open, letting a trial call through");
        }
    }

    pub fn state(&self, agent: &str) -> CircuitState {
        self.states
            .read()
            .get(agent)
            .cloned()
            .unwrap_or(CircuitState::Closed { failures: 0 })
    }

    /// Close every circuit.
    pub fn reset(&self) {
        self.states.write().clear();
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
