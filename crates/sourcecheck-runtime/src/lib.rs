//! # sourcecheck-runtime
//!
//! Optional async runtime for sourcecheck.
//!
//! Runs the deterministic pipeline from `sourcecheck-core` with claims
//! verified in parallel, and lets slow or remote validators ("agents")
//! vote alongside the core validators.
//!
//! ## Important
//!
//! This crate is OPTIONAL. `sourcecheck-core` verifies records on its own,
//! synchronously, and produces the same dispositions when no agents are
//! registered.
//!
//! Use this crate when:
//! - Records carry many claims and verification should use several cores
//! - A validator lives behind a network call and needs a timeout
//! - A hard time budget per record matters more than a complete report
//!
//! ## Example
//!
//! ```rust,ignore
//! use sourcecheck_runtime::{RuntimeConfig, RuntimeOrchestratorBuilder};
//!
//! let runtime = RuntimeOrchestratorBuilder::new()
//!     .checker(Arc::new(checker))
//!     .config(RuntimeConfig::from_yaml("max_concurrency: 8\ndeadline: 30s")?)
//!     .agent(Arc::new(RemoteNli::new(endpoint)))
//!     .build()?;
//!
//! let result = runtime.verify(&transcript, &fields).await?;
//! println!("{} abandoned", result.report.abandoned.len());
//! ```

pub mod agents;
pub mod cache;
pub mod config;
pub mod evidence;
pub mod orchestrator;
pub mod resilience;

pub use agents::{AgentError, AgentVote, ValidatorAgent, AGENT_RETRIEVER_PREFIX};
pub use cache::{ReportCache, ReportKey};
pub use config::{ReportCacheConfig, RuntimeConfig};
pub use evidence::{SpanValidationError, SpanValidator};
pub use orchestrator::{AgentUsage, RuntimeError, RuntimeOrchestrator, RuntimeOrchestratorBuilder, RuntimeResult};
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState, FallbackStrategy};
