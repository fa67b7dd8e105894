//! Validator agent trait and common types.

use async_trait::async_trait;
use std::time::Duration;
use sourcecheck_core::{Claim, EvidenceSpan, ValidatorResult};
use thiserror::Error;

use crate::evidence::SpanValidationError;

/// Errors from validator agents.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Agent call failed: {0}")]
    CallFailed(String),

    #[error("Evidence validation failed: {0}")]
    EvidenceInvalid(#[from] SpanValidationError),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Circuit open")]
    CircuitOpen,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Retriever name given to accepted cited spans, followed by the agent name.
pub const AGENT_RETRIEVER_PREFIX: &str = "agent:";

/// What an agent returns for one claim.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentVote {
    pub result: ValidatorResult,

    /// Spans of the source document the vote rests on. Checked against
    /// the document before the vote is accepted, then added to the
    /// claim's evidence under the `agent:<name>` retriever.
    pub cited: Vec<EvidenceSpan>,
}

impl AgentVote {
    pub fn new(result: ValidatorResult) -> Self {
        Self {
            result,
            cited: Vec::new(),
        }
    }

    pub fn citing(mut self, span: EvidenceSpan) -> Self {
        self.cited.push(span);
        self
    }
}

/// Trait for async validator agents.
///
/// # Isolation Contract
/// - An agent sees one claim, its retrieved evidence and the document
/// - No access to other validators' results for the claim
/// - Agents produce votes, never dispositions; arbitration stays deterministic
#[async_trait]
pub trait ValidatorAgent: Send + Sync {
    /// Name recorded on the agent's results and used for its circuit.
    fn name(&self) -> &str;

    /// Whether this agent votes on `claim`. Claims no agent handles are
    /// validated by the core validators only.
    fn handles(&self, _claim: &Claim) -> bool {
        true
    }

    /// Validate one claim.
    async fn validate(
        &self,
        claim: &Claim,
        evidence: &[EvidenceSpan],
        document: &str,
    ) -> Result<AgentVote, AgentError>;

    /// Per-agent timeout; `None` uses the runtime's `agent_timeout`.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}
