use std::collections::BTreeSet;

use super::{fixture, ConformantStore, TestResult};
use crate::record::DefinitionBundle;

pub(super) fn run_connection_tests<S, F>(factory: &F) -> Vec<TestResult>
where
    S: ConformantStore,
    F: Fn(&DefinitionBundle) -> S,
{
    vec![
        TestResult::from_result(
            "connections",
            "single_stream_resolves_its_pipelines",
            single_stream_resolves_its_pipelines(factory),
        ),
        TestResult::from_result(
            "connections",
            "multiple_streams_resolve_to_the_union",
            multiple_streams_resolve_to_the_union(factory),
        ),
        TestResult::from_result(
            "connections",
            "unknown_stream_resolves_to_nothing",
            unknown_stream_resolves_to_nothing(factory),
        ),
    ]
}

fn set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

// ── Test implementations ──────────────────────────────────────────────────────

fn single_stream_resolves_its_pipelines<S, F>(factory: &F) -> Result<(), String>
where
    S: ConformantStore,
    F: Fn(&DefinitionBundle) -> S,
{
    let s = factory(&fixture());
    let resolved = s
        .resolve_pipelines(&["s-default".to_string()])
        .map_err(|e| e.to_string())?;
    if resolved != set(&["p-main"]) {
        return Err(format!("expected {{p-main}}, got {:?}", resolved));
    }
    Ok(())
}

fn multiple_streams_resolve_to_the_union<S, F>(factory: &F) -> Result<(), String>
where
    S: ConformantStore,
    F: Fn(&DefinitionBundle) -> S,
{
    let s = factory(&fixture());
    let resolved = s
        .resolve_pipelines(&["s-default".to_string(), "s-audit".to_string()])
        .map_err(|e| e.to_string())?;
    if resolved != set(&["p-audit", "p-main"]) {
        return Err(format!("expected {{p-audit, p-main}}, got {:?}", resolved));
    }
    Ok(())
}

fn unknown_stream_resolves_to_nothing<S, F>(factory: &F) -> Result<(), String>
where
    S: ConformantStore,
    F: Fn(&DefinitionBundle) -> S,
{
    let s = factory(&fixture());
    let resolved = s
        .resolve_pipelines(&["s-missing".to_string()])
        .map_err(|e| e.to_string())?;
    if !resolved.is_empty() {
        return Err(format!("expected no pipelines, got {:?}", resolved));
    }
    Ok(())
}
