//! Async validator agents.
//!
//! An agent is an out-of-process or otherwise slow validator (a hosted
//! NLI model, a fact service) that votes on claims alongside, or instead
//! of, the deterministic core validators.

mod traits;

pub use traits::{AgentError, AgentVote, ValidatorAgent, AGENT_RETRIEVER_PREFIX};
