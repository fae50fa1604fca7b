use super::{fixture, ConformantStore, TestResult};
use crate::record::DefinitionBundle;

pub(super) fn run_stream_tests<S, F>(factory: &F) -> Vec<TestResult>
where
    S: ConformantStore,
    F: Fn(&DefinitionBundle) -> S,
{
    vec![
        TestResult::from_result(
            "streams",
            "all_streams_are_listed",
            all_streams_are_listed(factory),
        ),
        TestResult::from_result(
            "streams",
            "single_stream_lookup",
            single_stream_lookup(factory),
        ),
        TestResult::from_result(
            "streams",
            "missing_stream_is_none",
            missing_stream_is_none(factory),
        ),
    ]
}

// ── Test implementations ──────────────────────────────────────────────────────

fn all_streams_are_listed<S, F>(factory: &F) -> Result<(), String>
where
    S: ConformantStore,
    F: Fn(&DefinitionBundle) -> S,
{
    let bundle = fixture();
    let s = factory(&bundle);
    let mut ids: Vec<String> = s
        .load_streams()
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(|s| s.id)
        .collect();
    ids.sort();
    if ids != vec!["s-audit".to_string(), "s-default".to_string()] {
        return Err(format!("unexpected streams {:?}", ids));
    }
    Ok(())
}

fn single_stream_lookup<S, F>(factory: &F) -> Result<(), String>
where
    S: ConformantStore,
    F: Fn(&DefinitionBundle) -> S,
{
    let s = factory(&fixture());
    let stream = s
        .load_stream("s-audit")
        .map_err(|e| e.to_string())?
        .ok_or("stream s-audit missing")?;
    if stream.title != "Audit" || !stream.remove_matches_from_default_stream {
        return Err(format!("stream s-audit differs: {:?}", stream));
    }
    Ok(())
}

fn missing_stream_is_none<S, F>(factory: &F) -> Result<(), String>
where
    S: ConformantStore,
    F: Fn(&DefinitionBundle) -> S,
{
    let s = factory(&fixture());
    match s.load_stream("s-missing").map_err(|e| e.to_string())? {
        None => Ok(()),
        Some(found) => Err(format!("expected no stream, got {:?}", found)),
    }
}
