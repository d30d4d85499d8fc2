//! Rollup host harness
//!
//! The `rollup` command plays the part of the hosting pipeline: it seeds a
//! record store, hands the rollup step a triggering context, and commits the
//! mutated target the way the host would after a successful invocation.
//!
//! ## Commands
//!
//! - `run`: execute the step against a JSON fixture
//! - `check-config`: validate an unsecure configuration string

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rollup_core::{
    ExecutionContext, MemoryTraceSink, Outcome, Record, RecordStore, RollupConfig, RollupSettings,
    RollupStep, TraceSink, TracingSink,
};
use rollup_store::fakes::MemoryRecordStore;
use rollup_store::SurrealRecordStore;
use serde::{Deserialize, Serialize};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "rollup")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run the sibling rollup step against a record fixture", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute the step for the triggering context in a fixture file
    Run {
        /// Path to the fixture (JSON: config, records, context)
        fixture: PathBuf,

        /// Store backend to seed and query
        #[arg(short, long, value_enum, default_value_t = Backend::Memory)]
        backend: Backend,

        /// Print the step's trace output after the result
        #[arg(long)]
        show_trace: bool,
    },

    /// Validate an unsecure configuration and print the resolved settings
    CheckConfig {
        /// Unsecure configuration string (JSON object or empty)
        #[arg(default_value = "")]
        unsecure: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// In-memory fake store
    Memory,
    /// SurrealDB, connected from SURREALDB_* environment or in-memory
    Surreal,
}

/// Fixture file layout.
#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default)]
    config: RollupConfig,
    /// Records present in the store before the event
    #[serde(default)]
    records: Vec<Record>,
    /// The event being handled
    context: ExecutionContext,
}

/// What `run` prints.
#[derive(Debug, Serialize)]
struct RunReport {
    outcome: Outcome,
    target: Record,
    committed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    rollup_core::telemetry::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            fixture,
            backend,
            show_trace,
        } => cmd_run(&fixture, backend, show_trace).await,
        Commands::CheckConfig { unsecure } => cmd_check_config(&unsecure),
    }
}

fn load_fixture(path: &Path) -> Result<Fixture> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fixture: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse fixture: {}", path.display()))
}

async fn open_store(backend: Backend) -> Result<Box<dyn RecordStore>> {
    let store: Box<dyn RecordStore> = match backend {
        Backend::Memory => Box::new(MemoryRecordStore::new()),
        Backend::Surreal => Box::new(
            SurrealRecordStore::from_env()
                .await
                .context("Failed to connect to SurrealDB")?,
        ),
    };
    Ok(store)
}

/// Seed the store, run the step, and commit the target on success.
async fn execute_fixture(
    fixture: Fixture,
    store: &dyn RecordStore,
    trace: &dyn TraceSink,
) -> Result<RunReport> {
    for record in fixture.records {
        store
            .upsert(record)
            .await
            .context("Failed to seed fixture record")?;
    }

    let step = RollupStep::new(fixture.config).context("Invalid step configuration")?;
    let mut ctx = fixture.context;

    let outcome = step
        .execute(&mut ctx, store, trace)
        .await
        .context("Rollup step failed; nothing was committed")?;

    let committed = matches!(outcome, Outcome::Applied(_));
    if committed {
        store
            .upsert(ctx.target.clone())
            .await
            .context("Failed to commit target")?;
        info!(record = %ctx.target.id, "target committed");
    }

    Ok(RunReport {
        outcome,
        target: ctx.target,
        committed,
    })
}

async fn cmd_run(fixture_path: &Path, backend: Backend, show_trace: bool) -> Result<()> {
    let fixture = load_fixture(fixture_path)?;
    let store = open_store(backend).await?;
    let memory_sink = MemoryTraceSink::new();
    let trace: &dyn TraceSink = if show_trace {
        &memory_sink
    } else {
        &TracingSink
    };

    let report = execute_fixture(fixture, store.as_ref(), trace).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if show_trace {
        println!();
        println!("Trace:");
        for entry in memory_sink.entries() {
            println!("  [{}] {}", entry.recorded_at.to_rfc3339(), entry.message);
        }
    }
    Ok(())
}

fn cmd_check_config(unsecure: &str) -> Result<()> {
    let settings = RollupSettings::parse(unsecure).context("Invalid unsecure configuration")?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_core::{EntityReference, MessageName, RecordId};
    use serde_json::json;

    fn fixture_json(parent: RecordId, child: RecordId, sibling: RecordId) -> serde_json::Value {
        let reference = json!({"type": "reference", "value": {"entity": "lat_rollupentity", "id": parent}});
        json!({
            "config": {"secure_config": "", "unsecure_config": ""},
            "records": [
                {"entity": "lat_rollupentity", "id": child, "attributes": {
                    "lat_parentrollupid": reference,
                    "lat_value": {"type": "integer", "value": 5}
                }},
                {"entity": "lat_rollupentity", "id": sibling, "attributes": {
                    "lat_parentrollupid": reference,
                    "lat_value": {"type": "integer", "value": 15}
                }}
            ],
            "context": {
                "message": "update",
                "primary_entity": "lat_rollupentity",
                "target": {"entity": "lat_rollupentity", "id": child, "attributes": {
                    "lat_parentrollupid": reference,
                    "lat_value": {"type": "integer", "value": 5},
                    "lat_name": {"type": "text", "value": "Test Child"}
                }}
            }
        })
    }

    #[tokio::test]
    async fn run_fixture_commits_rollup() {
        let (parent, child, sibling) = (RecordId::new(), RecordId::new(), RecordId::new());
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("fixture.json");
        std::fs::write(&path, fixture_json(parent, child, sibling).to_string()).unwrap();

        let store = MemoryRecordStore::new();
        let report = execute_fixture(load_fixture(&path).unwrap(), &store, &MemoryTraceSink::new())
            .await
            .unwrap();

        assert!(report.committed);
        assert_eq!(report.target.get_text("lat_name"), Some("5/20"));

        let stored = store
            .retrieve("lat_rollupentity", child)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.get_text("lat_name"), Some("5/20"));
        assert_eq!(
            stored.get_reference("lat_parentrollupid"),
            Some(&EntityReference::new("lat_rollupentity", parent))
        );
    }

    #[tokio::test]
    async fn bundled_fixture_produces_expected_summary() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/update_child.json");
        let store = MemoryRecordStore::new();

        let report = execute_fixture(load_fixture(&path).unwrap(), &store, &MemoryTraceSink::new())
            .await
            .unwrap();

        assert_eq!(report.target.get_text("lat_name"), Some("5/20"));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn failed_step_commits_nothing() {
        let store = MemoryRecordStore::new();
        let orphan = Record::new("lat_rollupentity", RecordId::new()).with("lat_value", 5);
        let fixture = Fixture {
            config: RollupConfig::default(),
            records: Vec::new(),
            context: ExecutionContext::new(MessageName::Create, orphan),
        };

        let err = execute_fixture(fixture, &store, &MemoryTraceSink::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("nothing was committed"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn skipped_step_is_not_committed() {
        let store = MemoryRecordStore::new();
        let record = Record::new("lat_rollupentity", RecordId::new()).with("lat_value", 5);
        let fixture = Fixture {
            config: RollupConfig::default(),
            records: Vec::new(),
            context: ExecutionContext::new(MessageName::Delete, record),
        };

        let report = execute_fixture(fixture, &store, &MemoryTraceSink::new())
            .await
            .unwrap();

        assert!(!report.committed);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unknown_host_message_is_skipped() {
        let (parent, child, sibling) = (RecordId::new(), RecordId::new(), RecordId::new());
        let mut fixture = fixture_json(parent, child, sibling);
        fixture["context"]["message"] = json!("Assign");
        let fixture: Fixture = serde_json::from_value(fixture).unwrap();
        assert_eq!(
            fixture.context.message,
            MessageName::Other("Assign".to_string())
        );

        let store = MemoryRecordStore::new();
        let report = execute_fixture(fixture, &store, &MemoryTraceSink::new())
            .await
            .unwrap();

        assert!(!report.committed);
        assert_eq!(report.target.get_text("lat_name"), Some("Test Child"));
    }

    #[test]
    fn missing_fixture_reports_path() {
        let err = load_fixture(Path::new("/nonexistent/fixture.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/fixture.json"));
    }

    #[test]
    fn check_config_rejects_bad_json() {
        assert!(cmd_check_config("").is_ok());
        assert!(cmd_check_config("{bad").is_err());
    }

    #[test]
    fn cli_parses_run_arguments() {
        let cli = Cli::try_parse_from(["rollup", "run", "f.json", "--backend", "surreal", "--show-trace"])
            .unwrap();
        match cli.command {
            Commands::Run {
                fixture,
                backend,
                show_trace,
            } => {
                assert_eq!(fixture, PathBuf::from("f.json"));
                assert_eq!(backend, Backend::Surreal);
                assert!(show_trace);
            }
            Commands::CheckConfig { .. } => panic!("expected run"),
        }
    }
}
