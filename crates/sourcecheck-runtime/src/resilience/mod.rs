//! Resilience around validator agents.
//!
//! This module provides:
//! - Circuit breaker per agent, so a failing agent stops being called
//! - Fallback strategies for votes an agent could not deliver

mod circuit_breaker;
mod fallback;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use fallback::FallbackStrategy;
pub(crate) use fallback::discount;
