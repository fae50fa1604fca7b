use super::{fixture, ConformantStore, TestResult};
use crate::record::DefinitionBundle;

pub(super) fn run_definition_tests<S, F>(factory: &F) -> Vec<TestResult>
where
    S: ConformantStore,
    F: Fn(&DefinitionBundle) -> S,
{
    vec![
        TestResult::from_result(
            "definitions",
            "rules_are_returned_intact",
            rules_are_returned_intact(factory),
        ),
        TestResult::from_result(
            "definitions",
            "pipelines_are_returned_intact",
            pipelines_are_returned_intact(factory),
        ),
        TestResult::from_result(
            "definitions",
            "stage_order_is_preserved",
            stage_order_is_preserved(factory),
        ),
        TestResult::from_result(
            "definitions",
            "empty_store_loads_nothing",
            empty_store_loads_nothing(factory),
        ),
    ]
}

// ── Test implementations ──────────────────────────────────────────────────────

fn rules_are_returned_intact<S, F>(factory: &F) -> Result<(), String>
where
    S: ConformantStore,
    F: Fn(&DefinitionBundle) -> S,
{
    let bundle = fixture();
    let s = factory(&bundle);
    let mut rules = s.load_rules().map_err(|e| e.to_string())?;
    rules.sort_by(|a, b| a.id.cmp(&b.id));
    let mut expected = bundle.rules.clone();
    expected.sort_by(|a, b| a.id.cmp(&b.id));
    if rules != expected {
        return Err(format!("expected {:?}, got {:?}", expected, rules));
    }
    Ok(())
}

fn pipelines_are_returned_intact<S, F>(factory: &F) -> Result<(), String>
where
    S: ConformantStore,
    F: Fn(&DefinitionBundle) -> S,
{
    let bundle = fixture();
    let s = factory(&bundle);
    let pipelines = s.load_pipelines().map_err(|e| e.to_string())?;
    if pipelines.len() != bundle.pipelines.len() {
        return Err(format!(
            "expected {} pipelines, got {}",
            bundle.pipelines.len(),
            pipelines.len()
        ));
    }
    for expected in &bundle.pipelines {
        match pipelines.iter().find(|p| p.id == expected.id) {
            Some(found) if found == expected => {}
            Some(found) => return Err(format!("pipeline {} differs: {:?}", expected.id, found)),
            None => return Err(format!("pipeline {} missing", expected.id)),
        }
    }
    Ok(())
}

fn stage_order_is_preserved<S, F>(factory: &F) -> Result<(), String>
where
    S: ConformantStore,
    F: Fn(&DefinitionBundle) -> S,
{
    let s = factory(&fixture());
    let pipelines = s.load_pipelines().map_err(|e| e.to_string())?;
    let main = pipelines
        .iter()
        .find(|p| p.id == "p-main")
        .ok_or("pipeline p-main missing")?;
    let stages: Vec<i32> = main.stages.iter().map(|s| s.stage).collect();
    if stages != vec![0, 5] {
        return Err(format!("expected stages [0, 5], got {:?}", stages));
    }
    Ok(())
}

fn empty_store_loads_nothing<S, F>(factory: &F) -> Result<(), String>
where
    S: ConformantStore,
    F: Fn(&DefinitionBundle) -> S,
{
    let s = factory(&DefinitionBundle::default());
    let rules = s.load_rules().map_err(|e| e.to_string())?;
    let pipelines = s.load_pipelines().map_err(|e| e.to_string())?;
    if !rules.is_empty() || !pipelines.is_empty() {
        return Err(format!(
            "expected an empty store, got {} rules and {} pipelines",
            rules.len(),
            pipelines.len()
        ));
    }
    Ok(())
}
