//! Conformance test suite for definition stores.
//!
//! A backend-agnostic suite that any store implementing the three source
//! traits can run to verify it answers queries the way the engine expects.
//! The suite covers:
//!
//! - **Definitions**: every stored rule and pipeline is returned intact
//! - **Connections**: stream to pipeline resolution, unions, unknown streams
//! - **Streams**: single and bulk stream lookups
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory that builds
//! a fresh store seeded with the given bundle:
//!
//! ```ignore
//! use conduit_storage::conformance::run_conformance_suite;
//!
//! #[test]
//! fn sql_conformance() {
//!     let report = run_conformance_suite(|bundle| seed_sql_store(bundle));
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod connections;
mod definitions;
mod streams;

use std::collections::BTreeSet;
use std::fmt;

use crate::record::{
    DefinitionBundle, PipelineConnections, PipelineDefinition, RuleDefinition, StageDefinition,
    StageMatch, StreamRecord,
};
use crate::traits::{ConnectionResolver, DefinitionSource, StreamSource};

/// Everything the suite needs from a store.
pub trait ConformantStore: DefinitionSource + ConnectionResolver + StreamSource {}

impl<T: DefinitionSource + ConnectionResolver + StreamSource> ConformantStore for T {}

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "definitions", "connections").
    pub category: String,
    /// Test name (e.g. "rules_are_returned_intact").
    pub name: String,
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: result.is_ok(),
            message: result.err(),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a store.
///
/// The `factory` is called once per test with the [`fixture`] bundle and
/// must return a store holding exactly that content.
pub fn run_conformance_suite<S, F>(factory: F) -> ConformanceReport
where
    S: ConformantStore,
    F: Fn(&DefinitionBundle) -> S,
{
    let mut results = Vec::new();

    results.extend(definitions::run_definition_tests(&factory));
    results.extend(connections::run_connection_tests(&factory));
    results.extend(streams::run_stream_tests(&factory));

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Fixture ──────────────────────────────────────────────────────────────────

/// The bundle every conformance test seeds its store with.
pub fn fixture() -> DefinitionBundle {
    DefinitionBundle {
        rules: vec![
            make_rule("r-increment", "increment"),
            make_rule("r-tag", "tag"),
        ],
        pipelines: vec![
            PipelineDefinition {
                id: "p-main".to_string(),
                title: "main".to_string(),
                description: Some("default processing".to_string()),
                stages: vec![
                    StageDefinition {
                        stage: 0,
                        match_policy: StageMatch::Either,
                        rules: vec!["increment".to_string()],
                    },
                    StageDefinition {
                        stage: 5,
                        match_policy: StageMatch::All,
                        rules: vec!["tag".to_string()],
                    },
                ],
            },
            PipelineDefinition {
                id: "p-audit".to_string(),
                title: "audit".to_string(),
                description: None,
                stages: vec![StageDefinition {
                    stage: 0,
                    match_policy: StageMatch::All,
                    rules: vec!["tag".to_string()],
                }],
            },
        ],
        connections: vec![
            make_connection("s-default", &["p-main"]),
            make_connection("s-audit", &["p-audit", "p-main"]),
        ],
        streams: vec![
            StreamRecord {
                id: "s-default".to_string(),
                title: "All messages".to_string(),
                remove_matches_from_default_stream: false,
            },
            StreamRecord {
                id: "s-audit".to_string(),
                title: "Audit".to_string(),
                remove_matches_from_default_stream: true,
            },
        ],
    }
}

fn make_rule(id: &str, title: &str) -> RuleDefinition {
    RuleDefinition {
        id: id.to_string(),
        title: title.to_string(),
        description: None,
        source: format!("{{\"name\": \"{title}\"}}"),
        modified_at: Some("2025-01-01T00:00:00Z".to_string()),
    }
}

fn make_connection(stream_id: &str, pipelines: &[&str]) -> PipelineConnections {
    PipelineConnections {
        stream_id: stream_id.to_string(),
        pipeline_ids: pipelines.iter().map(|p| p.to_string()).collect::<BTreeSet<_>>(),
    }
}
