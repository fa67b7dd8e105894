//! Runtime orchestrator for parallel claim verification.
//!
//! The orchestrator runs the core pipeline with claims fanned out over
//! tokio tasks. It implements:
//! - Bounded fan-out (`max_concurrency` claims at a time), fan-in in
//!   extraction order
//! - Async validator agents with timeout, circuit breaker and
//!   deterministic fallback
//! - Integrity checks on agent-cited evidence
//! - A cooperative deadline: claims not started in time are abandoned
//! - Report memoisation

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;

use sourcecheck_core::{
    Checker, Claim, ConfigError, Disposition, EvidenceSpan, RetrieverIndex, ValidatorResult,
    VerificationReport,
};

use crate::agents::{AgentError, AgentVote, ValidatorAgent, AGENT_RETRIEVER_PREFIX};
use crate::cache::{hash_one, ReportCache, ReportKey};
use crate::config::RuntimeConfig;
use crate::evidence::SpanValidator;
use crate::resilience::{discount, CircuitBreaker, FallbackStrategy};

/// Errors from the runtime orchestrator.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Checker not configured")]
    CheckerNotConfigured,

    #[error("Invalid runtime configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Claim task failed: {0}")]
    TaskFailed(String),
}

/// Agent call counters for one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AgentUsage {
    /// Agent calls actually made
    pub calls: u64,

    pub failures: u64,
    pub timeouts: u64,

    /// Votes dropped because cited spans did not match the document
    pub rejected_evidence: u64,

    /// Calls skipped because the agent's circuit was open
    pub circuit_open: u64,

    /// Claims whose missing agent votes were replaced by core validators
    pub deterministic_fallbacks: u64,
}

impl AgentUsage {
    fn record(&mut self, outcome: &Result<AgentVote, AgentError>) {
        match outcome {
            Ok(_) => self.calls += 1,
            Err(AgentError::CircuitOpen) => self.circuit_open += 1,
            Err(err) => {
                self.calls += 1;
                match err {
                    AgentError::Timeout(_) => self.timeouts += 1,
                    AgentError::EvidenceInvalid(_) => self.rejected_evidence += 1,
                    _ => self.failures += 1,
                }
            }
        }
    }

    fn merge(&mut self, other: AgentUsage) {
        self.calls += other.calls;
        self.failures += other.failures;
        self.timeouts += other.timeouts;
        self.rejected_evidence += other.rejected_evidence;
        self.circuit_open += other.circuit_open;
        self.deterministic_fallbacks += other.deterministic_fallbacks;
    }
}

/// Result from runtime verification.
#[derive(Debug, Clone)]
pub struct RuntimeResult {
    pub report: Arc<VerificationReport>,

    pub agent_usage: AgentUsage,

    /// Whether the deadline cut the run short; see `report.abandoned`
    pub deadline_hit: bool,

    /// Whether the report came from the memo cache
    pub from_cache: bool,
}

/// The runtime orchestrator.
///
/// # Architecture
/// - Fan-out: each claim runs in its own tokio task, at most
///   `max_concurrency` at a time
/// - Fan-in: dispositions are collected in extraction order and
///   assembled by the core checker
/// - Resilience: timeout and circuit breaker per agent
/// - Fallback: a missing agent vote is replaced by the field's core
///   validators (or recorded as a failed vote)
pub struct RuntimeOrchestrator {
    checker: Arc<Checker>,
    config: RuntimeConfig,
    circuit_breaker: Arc<CircuitBreaker>,
    agents: Vec<Arc<dyn ValidatorAgent>>,
    cache: Option<ReportCache>,
}

impl RuntimeOrchestrator {
    pub fn new(checker: Arc<Checker>, config: RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        let circuit_breaker = Arc::new(CircuitBreaker::new(config.circuit_breaker.clone()));
        let cache = config.cache.enabled.then(|| ReportCache::from_config(&config.cache));
        Ok(Self {
            checker,
            config,
            circuit_breaker,
            agents: Vec::new(),
            cache,
        })
    }

    pub fn register_agent(&mut self, agent: Arc<dyn ValidatorAgent>) {
        self.agents.push(agent);
    }

    pub fn checker(&self) -> &Arc<Checker> {
        &self.checker
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// Verify a record against `document`.
    ///
    /// # Execution Flow
    /// 1. Memo cache lookup
    /// 2. Extract claims and fetch the retriever index (deterministic)
    /// 3. Fan-out: claims verified in parallel, bounded by `max_concurrency`
    /// 4. Fan-in: dispositions in extraction order, report assembly
    ///
    /// Agent failures never surface here; only a panicked claim task does.
    pub async fn verify(
        &self,
        document: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<RuntimeResult, RuntimeError> {
        let key = ReportKey::new(self.fingerprint(), document, fields);
        if let Some(cache) = &self.cache {
            if let Some(report) = cache.get(&key).await {
                tracing::debug!(claims = report.counts.total(), "report cache hit");
                return Ok(RuntimeResult {
                    report,
                    agent_usage: AgentUsage::default(),
                    deadline_hit: false,
                    from_cache: true,
                });
            }
        }

        let deadline = self.config.deadline.map(|d| Instant::now() + d);
        let claims = self.checker.extract(fields);
        let document: Arc<str> = Arc::from(document);

        let index = {
            let checker = Arc::clone(&self.checker);
            let document = Arc::clone(&document);
            tokio::task::spawn_blocking(move || checker.index_for(&document))
                .await
                .map_err(|e| RuntimeError::TaskFailed(format!("index build: {}", e)))?
        };

        let run = Arc::new(ClaimRun {
            checker: Arc::clone(&self.checker),
            agents: self.agents.clone(),
            circuit_breaker: Arc::clone(&self.circuit_breaker),
            config: self.config.clone(),
            document,
            fields: fields.clone(),
            index,
        });

        let outcomes: Vec<Result<ClaimOutcome, RuntimeError>> = stream::iter(claims.into_iter().map(|claim| {
            let run = Arc::clone(&run);
            async move {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    tracing::warn!(claim = %claim.id, "deadline passed, claim abandoned");
                    return Ok(ClaimOutcome::Abandoned(claim.id));
                }
                let id = claim.id.clone();
                tokio::spawn(async move { run.verify_claim(claim).await })
                    .await
                    .map_err(|e| RuntimeError::TaskFailed(format!("{}: {}", id, e)))?
                    .map(|(disposition, usage)| ClaimOutcome::Done(Box::new(disposition), usage))
            }
        }))
        .buffered(self.config.max_concurrency)
        .collect()
        .await;

        let mut dispositions = Vec::new();
        let mut abandoned = Vec::new();
        let mut agent_usage = AgentUsage::default();
        for outcome in outcomes {
            match outcome? {
                ClaimOutcome::Done(disposition, usage) => {
                    dispositions.push(*disposition);
                    agent_usage.merge(usage);
                }
                ClaimOutcome::Abandoned(id) => abandoned.push(id),
            }
        }

        let mut report = self.checker.assemble(dispositions, fields);
        let deadline_hit = !abandoned.is_empty();
        report.abandoned = abandoned;
        let report = Arc::new(report);

        if let Some(cache) = &self.cache {
            if !deadline_hit {
                cache.insert(key, Arc::clone(&report)).await;
            }
        }

        tracing::info!(
            claims = report.counts.total(),
            abandoned = report.abandoned.len(),
            agent_calls = agent_usage.calls,
            fallbacks = agent_usage.deterministic_fallbacks,
            "record verified"
        );

        Ok(RuntimeResult {
            report,
            agent_usage,
            deadline_hit,
            from_cache: false,
        })
    }

    /// Drop memoised reports and the checker's retriever indices.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
        self.checker.clear_cache();
    }

    /// Everything besides the inputs that shapes a report.
    fn fingerprint(&self) -> u64 {
        let policy = serde_json::to_string(self.checker.policy()).unwrap_or_default();
        let schema = serde_json::to_string(self.checker.schema()).unwrap_or_default();
        let agents: Vec<&str> = self.agents.iter().map(|a| a.name()).collect();
        hash_one((policy, schema, agents))
    }
}

enum ClaimOutcome {
    Done(Box<Disposition>, AgentUsage),
    Abandoned(String),
}

/// Shared, read-only state for the claims of one record.
struct ClaimRun {
    checker: Arc<Checker>,
    agents: Vec<Arc<dyn ValidatorAgent>>,
    circuit_breaker: Arc<CircuitBreaker>,
    config: RuntimeConfig,
    document: Arc<str>,
    fields: BTreeMap<String, String>,
    index: RetrieverIndex,
}

impl ClaimRun {
    async fn verify_claim(self: Arc<Self>, claim: Claim) -> Result<(Disposition, AgentUsage), RuntimeError> {
        let mut evidence = {
            let claim = claim.clone();
            self.blocking(move |run| run.checker.retrieve(&run.index, &claim, &run.fields))
                .await?
        };
        let (results, cited, usage) = self.validate(&claim, &evidence).await?;
        for span in cited {
            if !evidence.iter().any(|e| e.start == span.start && e.end == span.end) {
                evidence.push(span);
            }
        }
        let disposition = self
            .blocking(move |run| run.checker.resolve(&claim, results, evidence, &run.document))
            .await?;
        Ok((disposition, usage))
    }

    /// Run synchronous checker work on the blocking pool.
    async fn blocking<T, F>(self: &Arc<Self>, work: F) -> Result<T, RuntimeError>
    where
        F: FnOnce(&ClaimRun) -> T + Send + 'static,
        T: Send + 'static,
    {
        let run = Arc::clone(self);
        tokio::task::spawn_blocking(move || work(&run))
            .await
            .map_err(|e| RuntimeError::TaskFailed(format!("checker stage: {}", e)))
    }

    async fn core_results(
        self: &Arc<Self>,
        claim: &Claim,
        evidence: &[EvidenceSpan],
    ) -> Result<Vec<ValidatorResult>, RuntimeError> {
        let (claim, evidence) = (claim.clone(), evidence.to_vec());
        self.blocking(move |run| run.checker.run_validators(&claim, &evidence, &run.document))
            .await
    }

    /// Agent votes for the claim, with fallbacks for the missing ones.
    /// Claims no agent handles go to the core validators directly.
    async fn validate(
        self: &Arc<Self>,
        claim: &Claim,
        evidence: &[EvidenceSpan],
    ) -> Result<(Vec<ValidatorResult>, Vec<EvidenceSpan>, AgentUsage), RuntimeError> {
        let mut usage = AgentUsage::default();
        let agents: Vec<&dyn ValidatorAgent> = self
            .agents
            .iter()
            .map(|a| a.as_ref())
            .filter(|a| a.handles(claim))
            .collect();
        if agents.is_empty() {
            let results = self.core_results(claim, evidence).await?;
            return Ok((results, Vec::new(), usage));
        }

        let votes = futures::future::join_all(
            agents
                .iter()
                .map(|agent| self.call_agent(*agent, claim, evidence)),
        )
        .await;

        let mut results = Vec::new();
        let mut cited = Vec::new();
        let mut needs_fallback = false;
        for (agent, vote) in agents.iter().zip(votes) {
            usage.record(&vote);
            match vote {
                Ok(vote) => {
                    results.push(vote.result);
                    cited.extend(vote.cited);
                }
                Err(err) => {
                    tracing::warn!(
                        claim = %claim.id,
                        agent = agent.name(),
                        error = %err,
                        fallback = self.config.fallback.as_str(),
                        "agent vote unavailable"
                    );
                    match self.config.fallback {
                        FallbackStrategy::Deterministic => needs_fallback = true,
                        FallbackStrategy::Abstain => {
                            results.push(ValidatorResult::failed(agent.name(), err.to_string()))
                        }
                    }
                }
            }
        }

        if needs_fallback {
            usage.deterministic_fallbacks += 1;
            let factor = self.config.fallback_confidence_factor;
            results.extend(
                self.core_results(claim, evidence)
                    .await?
                    .into_iter()
                    .map(|result| discount(result, factor)),
            );
        }
        Ok((results, cited, usage))
    }

    /// One agent call with circuit breaker, timeout and span checks.
    async fn call_agent(
        &self,
        agent: &dyn ValidatorAgent,
        claim: &Claim,
        evidence: &[EvidenceSpan],
    ) -> Result<AgentVote, AgentError> {
        let name = agent.name();
        if self.circuit_breaker.is_open(name) {
            return Err(AgentError::CircuitOpen);
        }

        let timeout = agent.timeout().unwrap_or(self.config.agent_timeout);
        let outcome = match tokio::time::timeout(timeout, agent.validate(claim, evidence, &self.document)).await {
            Ok(Ok(vote)) => SpanValidator::new(&self.document)
                .validate_all(&vote.cited)
                .map(|()| vote)
                .map_err(AgentError::from),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(AgentError::Timeout(timeout)),
        };

        match &outcome {
            Ok(_) => self.circuit_breaker.record_success(name),
            Err(_) => self.circuit_breaker.record_failure(name),
        }
        outcome.map(|mut vote| {
            vote.result.validator = name.to_string();
            for span in &mut vote.cited {
                span.retriever = format!("{}{}", AGENT_RETRIEVER_PREFIX, name);
            }
            vote
        })
    }
}

/// Builder for RuntimeOrchestrator.
pub struct RuntimeOrchestratorBuilder {
    checker: Option<Arc<Checker>>,
    config: RuntimeConfig,
    agents: Vec<Arc<dyn ValidatorAgent>>,
}

impl RuntimeOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            checker: None,
            config: RuntimeConfig::default(),
            agents: Vec::new(),
        }
    }

    pub fn checker(mut self, checker: Arc<Checker>) -> Self {
        self.checker = Some(checker);
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn agent(mut self, agent: Arc<dyn ValidatorAgent>) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn build(self) -> Result<RuntimeOrchestrator, RuntimeError> {
        let checker = self.checker.ok_or(RuntimeError::CheckerNotConfigured)?;
        let mut orchestrator = RuntimeOrchestrator::new(checker, self.config)?;
        for agent in self.agents {
            orchestrator.register_agent(agent);
        }
        Ok(orchestrator)
    }
}

impl Default for RuntimeOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
