//! sourcecheck CLI - verify generated records against their source text
//!
//! - `verify`: extract claims from a record and verify each against a document
//! - `extract`: show the claims a schema extracts from a record
//! - `check`: load a schema and policy and report configuration errors

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sourcecheck_core::{Checker, ClaimExtractor, ExtractionSchema, PolicyConfig, RetrieverCache, Verdict};
use sourcecheck_runtime::{RuntimeConfig, RuntimeOrchestratorBuilder};

#[derive(Parser)]
#[command(name = "sourcecheck")]
#[command(about = "Verify claims in a structured record against a source document", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a record against a source document
    Verify {
        /// Extraction schema (YAML or JSON)
        #[arg(long)]
        schema: PathBuf,

        /// Verification policy (YAML or JSON)
        #[arg(long)]
        policy: PathBuf,

        /// Source document, plain text
        #[arg(long)]
        document: PathBuf,

        /// Record to verify: a flat map of field name to text (YAML or JSON)
        #[arg(long)]
        fields: PathBuf,

        /// Runtime settings (YAML or JSON)
        #[arg(long)]
        runtime_config: Option<PathBuf>,

        /// Claims verified in parallel; overrides the runtime config
        #[arg(long)]
        concurrency: Option<usize>,

        /// Time budget for the record, e.g. "30s"; overrides the runtime config
        #[arg(long, value_parser = humantime::parse_duration)]
        deadline: Option<Duration>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,

        /// Include evidence and quality issues in text output
        #[arg(long)]
        detailed: bool,

        /// Exit with status 2 when any claim is refuted
        #[arg(long)]
        fail_on_refuted: bool,
    },

    /// Print the claims a schema extracts from a record
    Extract {
        #[arg(long)]
        schema: PathBuf,

        #[arg(long)]
        fields: PathBuf,
    },

    /// Validate a schema and policy without verifying anything
    Check {
        #[arg(long)]
        schema: PathBuf,

        #[arg(long)]
        policy: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable summary
    Text,
    /// Full report
    Json,
    /// One flat row per claim
    Records,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Verify {
            schema,
            policy,
            document,
            fields,
            runtime_config,
            concurrency,
            deadline,
            output,
            detailed,
            fail_on_refuted,
        } => {
            let schema = load_schema(&schema)?;
            let policy = load_policy(&policy)?;
            let document = std::fs::read_to_string(&document)
                .with_context(|| format!("reading document {}", document.display()))?;
            let fields = load_fields(&fields)?;
            tracing::debug!(
                schema = %schema.version,
                policy = %policy.version,
                fields = fields.len(),
                document_bytes = document.len(),
                "inputs loaded"
            );

            let mut config = match runtime_config {
                Some(path) => RuntimeConfig::from_file(&path)
                    .with_context(|| format!("loading runtime config {}", path.display()))?,
                None => RuntimeConfig::default(),
            };
            if let Some(n) = concurrency {
                config.max_concurrency = n;
            }
            if deadline.is_some() {
                config.deadline = deadline;
            }
            // one-shot process, nothing to memoise
            config.cache.enabled = false;

            let checker = Checker::new(&schema, &policy, Arc::new(RetrieverCache::default()))
                .context("compiling policy")?;
            let runtime = RuntimeOrchestratorBuilder::new()
                .checker(Arc::new(checker))
                .config(config)
                .build()?;
            let result = runtime.verify(&document, &fields).await?;
            let report = &result.report;

            match output {
                OutputFormat::Text => print!("{}", report.render_text(detailed)),
                OutputFormat::Json => println!("{}", report.to_json()?),
                OutputFormat::Records => {
                    println!("{}", serde_json::to_string_pretty(&report.flat_records())?)
                }
            }
            if result.deadline_hit {
                eprintln!(
                    "deadline reached: {} claim(s) not verified",
                    report.abandoned.len()
                );
            }

            if fail_on_refuted && report.dispositions.iter().any(|d| d.verdict == Verdict::Refuted) {
                std::process::exit(2);
            }
            Ok(())
        }
        Commands::Extract { schema, fields } => {
            let schema = load_schema(&schema)?;
            let fields = load_fields(&fields)?;
            let claims = ClaimExtractor::new(&schema)?.extract(&fields);
            println!("{}", serde_json::to_string_pretty(&claims)?);
            Ok(())
        }
        Commands::Check { schema, policy } => {
            let schema = load_schema(&schema)?;
            let policy = load_policy(&policy)?;
            Checker::new(&schema, &policy, Arc::new(RetrieverCache::default()))
                .context("compiling policy")?;
            println!(
                "ok: {} verifiable field(s), retriever {}, strategy {}",
                schema.verifiable_fields().count(),
                policy.retriever,
                policy.aggregation.strategy.as_str()
            );
            Ok(())
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}

fn load_schema(path: &Path) -> Result<ExtractionSchema> {
    let schema = if is_json(path) {
        ExtractionSchema::from_json_file(path)
    } else {
        ExtractionSchema::from_yaml_file(path)
    };
    schema.with_context(|| format!("loading schema {}", path.display()))
}

fn load_policy(path: &Path) -> Result<PolicyConfig> {
    let policy = if is_json(path) {
        PolicyConfig::from_json_file(path)
    } else {
        PolicyConfig::from_yaml_file(path)
    };
    policy.with_context(|| format!("loading policy {}", path.display()))
}

fn load_fields(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading record {}", path.display()))?;
    parse_fields(&content, is_json(path)).with_context(|| format!("parsing record {}", path.display()))
}

/// Field values may be strings, numbers or booleans; anything else is rejected.
fn parse_fields(content: &str, json: bool) -> Result<BTreeMap<String, String>> {
    let raw: BTreeMap<String, serde_json::Value> = if json {
        serde_json::from_str(content)?
    } else {
        serde_yaml::from_str(content)?
    };
    raw.into_iter()
        .map(|(name, value)| {
            let text = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Null => String::new(),
                other => anyhow::bail!("field '{}' must be text, got {}", name, other),
            };
            Ok((name, text))
        })
        .collect()
}
