//! Pipeline engine.
//!
//! The engine holds an immutable snapshot of prepared rules and built
//! pipelines behind an `Arc`. Evaluations clone the `Arc` once at the start
//! and work on that snapshot for the whole request; [`PipelineEngine::reload`]
//! builds a fresh snapshot and swaps it in, so a request never sees a
//! half-loaded set of definitions.
//!
//! One request processes the inbound message and then, breadth first, every
//! message its rules created. Created messages go through the same pipeline
//! selection as their parent, bounded by `max_generations` and
//! `max_created_messages`.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use conduit_core::{MatchPolicy, Pipeline, Rule, Stage};
use conduit_storage::{
    ConnectionResolver, DefinitionSource, PipelineDefinition, RuleDefinition, StageMatch,
};
use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;
use crate::context::EvaluationContext;
use crate::error::{EngineError, LoadProblem};
use crate::function::FunctionRegistry;
use crate::listener::{EvaluationEvent, EvaluationListener, NoopListener, RecordingListener};
use crate::message::Message;
use crate::parser::RuleParser;
use crate::prepared::PreparedRule;

pub type PreparedPipeline = Pipeline<Arc<PreparedRule>>;

/// Which pipelines a request runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applicable {
    /// The pipelines connected to these streams. Routing a message to
    /// further streams pulls in their pipelines as well.
    Streams(Vec<String>),
    /// Exactly these pipelines, by id.
    Pipelines(Vec<String>),
}

// ──────────────────────────────────────────────
// Snapshot
// ──────────────────────────────────────────────

/// One consistent set of loaded definitions.
#[derive(Debug, Default)]
pub struct EngineState {
    rules: HashMap<String, Arc<PreparedRule>>,
    pipelines: HashMap<String, Arc<PreparedPipeline>>,
}

impl EngineState {
    /// A rule by name.
    pub fn rule(&self, name: &str) -> Option<&Arc<PreparedRule>> {
        self.rules.get(name)
    }

    /// A pipeline by id.
    pub fn pipeline(&self, id: &str) -> Option<&Arc<PreparedPipeline>> {
        self.pipelines.get(id)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }
}

/// Outcome of [`PipelineEngine::reload`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub rules_loaded: usize,
    pub pipelines_loaded: usize,
    pub problems: Vec<LoadProblem>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Result of [`PipelineEngine::simulate`].
#[derive(Debug, Clone)]
pub struct Simulation {
    pub message: Message,
    pub created: Vec<Message>,
    pub events: Vec<EvaluationEvent>,
}

// ──────────────────────────────────────────────
// Engine
// ──────────────────────────────────────────────

pub struct PipelineEngine {
    registry: Arc<FunctionRegistry>,
    connections: Arc<dyn ConnectionResolver>,
    config: EngineConfig,
    state: RwLock<Arc<EngineState>>,
}

impl PipelineEngine {
    /// An engine with no definitions loaded.
    pub fn new(
        registry: Arc<FunctionRegistry>,
        connections: Arc<dyn ConnectionResolver>,
        config: EngineConfig,
    ) -> Self {
        PipelineEngine {
            registry,
            connections,
            config,
            state: RwLock::new(Arc::new(EngineState::default())),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// The definitions currently in use.
    pub fn snapshot(&self) -> Arc<EngineState> {
        Arc::clone(&self.state.read())
    }

    // ── Loading ──────────────────────────────────────────────────────────

    /// Load every rule and pipeline from `source` and swap them in.
    ///
    /// Definitions that fail to parse, build or link are left out and
    /// listed in the report. Only a failing `source` is an error, in which
    /// case the current definitions stay in place.
    pub fn reload(
        &self,
        source: &dyn DefinitionSource,
        parser: &dyn RuleParser,
    ) -> Result<LoadReport, EngineError> {
        let rule_defs = source.load_rules()?;
        let pipeline_defs = source.load_pipelines()?;
        let mut problems = Vec::new();

        let mut rules: HashMap<String, Arc<PreparedRule>> = HashMap::new();
        for def in &rule_defs {
            let prepared = match self.load_rule(def, parser) {
                Ok(prepared) => prepared,
                Err(problem) => {
                    warn!(rule = %def.id, error = %problem, "rule not loaded");
                    problems.push(problem);
                    continue;
                }
            };
            if let Some(existing) = rules.get(prepared.name()) {
                let problem = LoadProblem::DuplicateRuleName {
                    id: def.id.clone(),
                    name: prepared.name().to_string(),
                    existing: existing.id().to_string(),
                };
                warn!(rule = %def.id, error = %problem, "rule not loaded");
                problems.push(problem);
                continue;
            }
            rules.insert(prepared.name().to_string(), Arc::new(prepared));
        }

        let mut pipelines = HashMap::new();
        for def in &pipeline_defs {
            match link_pipeline(def, &rules, &mut problems) {
                Ok(pipeline) => {
                    pipelines.insert(def.id.clone(), Arc::new(pipeline));
                }
                Err(problem) => {
                    warn!(pipeline = %def.id, error = %problem, "pipeline not loaded");
                    problems.push(problem);
                }
            }
        }

        if self.config.compiler.enabled && self.config.compiler.threshold == 0 {
            let compiled = rules.values().filter(|r| r.compile_now()).count();
            debug!(compiled, total = rules.len(), "compiled rules at load");
        }

        let report = LoadReport {
            rules_loaded: rules.len(),
            pipelines_loaded: pipelines.len(),
            problems,
        };
        *self.state.write() = Arc::new(EngineState { rules, pipelines });
        info!(
            rules = report.rules_loaded,
            pipelines = report.pipelines_loaded,
            problems = report.problems.len(),
            "definitions reloaded"
        );
        Ok(report)
    }

    fn load_rule(
        &self,
        def: &RuleDefinition,
        parser: &dyn RuleParser,
    ) -> Result<PreparedRule, LoadProblem> {
        let ast = parser.parse(&def.source).map_err(|e| LoadProblem::Parse {
            id: def.id.clone(),
            message: e.to_string(),
        })?;
        let rule = Rule::build(def.id.clone(), &ast, self.registry.as_ref()).map_err(|source| {
            LoadProblem::Build {
                id: def.id.clone(),
                source,
            }
        })?;
        PreparedRule::prepare(Arc::new(rule), &self.registry).map_err(|source| {
            LoadProblem::Prepare {
                id: def.id.clone(),
                source,
            }
        })
    }

    // ── Evaluation ───────────────────────────────────────────────────────

    /// Run the applicable pipelines over `message`, mutating it in place.
    /// Returns the messages created along the way that were not dropped.
    pub fn evaluate(
        &self,
        message: &mut Message,
        applicable: &Applicable,
    ) -> Result<Vec<Message>, EngineError> {
        self.evaluate_with(message, applicable, &mut NoopListener)
    }

    pub fn evaluate_with(
        &self,
        message: &mut Message,
        applicable: &Applicable,
        listener: &mut dyn EvaluationListener,
    ) -> Result<Vec<Message>, EngineError> {
        let state = self.snapshot();
        let mut budget = self.config.max_created_messages;
        let mut queue = VecDeque::new();

        let children = self.process(&state, message, applicable, listener)?;
        self.admit(message.id(), children, 1, &mut budget, &mut queue, listener);

        let mut output = Vec::new();
        while let Some((mut child, generation)) = queue.pop_front() {
            if !child.is_dropped() {
                let applicable = match applicable {
                    Applicable::Streams(_) => {
                        Applicable::Streams(child.streams().iter().cloned().collect())
                    }
                    Applicable::Pipelines(ids) => Applicable::Pipelines(ids.clone()),
                };
                let children = self.process(&state, &mut child, &applicable, listener)?;
                self.admit(
                    child.id(),
                    children,
                    generation + 1,
                    &mut budget,
                    &mut queue,
                    listener,
                );
            }
            if !child.is_dropped() {
                output.push(child);
            }
        }
        Ok(output)
    }

    /// Queue created messages, enforcing the fan-out bounds.
    fn admit(
        &self,
        parent_id: &str,
        children: Vec<Message>,
        generation: usize,
        budget: &mut usize,
        queue: &mut VecDeque<(Message, usize)>,
        listener: &mut dyn EvaluationListener,
    ) {
        if children.is_empty() {
            return;
        }
        if generation > self.config.max_generations {
            warn!(
                parent = parent_id,
                discarded = children.len(),
                max_generations = self.config.max_generations,
                "created messages exceed the generation limit"
            );
            return;
        }
        let total = children.len();
        for child in children {
            if *budget == 0 {
                warn!(
                    parent = parent_id,
                    max_created_messages = self.config.max_created_messages,
                    "created message limit reached"
                );
                break;
            }
            *budget -= 1;
            listener.message_created(parent_id, child.id());
            queue.push_back((child, generation));
        }
        trace!(parent = parent_id, created = total, generation, "created messages queued");
    }

    /// Run every applicable pipeline over one message and return the
    /// messages it created.
    fn process(
        &self,
        state: &EngineState,
        message: &mut Message,
        applicable: &Applicable,
        listener: &mut dyn EvaluationListener,
    ) -> Result<Vec<Message>, EngineError> {
        let mut ctx = if self.config.memoize_pure_functions {
            EvaluationContext::new(message)
        } else {
            EvaluationContext::without_memoization(message)
        };
        let mut ran: BTreeSet<String> = BTreeSet::new();
        let mut seen_streams = ctx.message().streams().clone();
        let mut pending = match applicable {
            Applicable::Streams(ids) => self.connections.resolve_pipelines(ids)?,
            Applicable::Pipelines(ids) => ids.iter().cloned().collect(),
        };
        let mut passes = 0;

        loop {
            for id in &pending {
                if !ran.insert(id.clone()) {
                    continue;
                }
                let Some(pipeline) = state.pipeline(id) else {
                    debug!(pipeline = %id, "pipeline is not loaded");
                    continue;
                };
                self.run_pipeline(pipeline, &mut ctx, listener);
                if ctx.message().is_dropped() {
                    return Ok(ctx.take_created());
                }
            }
            if !matches!(applicable, Applicable::Streams(_)) {
                break;
            }
            let streams = ctx.message().streams().clone();
            let added: Vec<String> = streams.difference(&seen_streams).cloned().collect();
            if added.is_empty() {
                break;
            }
            passes += 1;
            if passes > self.config.max_route_iterations {
                warn!(
                    message = ctx.message().id(),
                    max_route_iterations = self.config.max_route_iterations,
                    "routing did not settle"
                );
                break;
            }
            seen_streams = streams;
            pending = self.connections.resolve_pipelines(&added)?;
            pending.retain(|id| !ran.contains(id));
            if pending.is_empty() {
                break;
            }
            debug!(streams = ?added, pipelines = pending.len(), "message routed to new streams");
        }
        Ok(ctx.take_created())
    }

    fn run_pipeline(
        &self,
        pipeline: &PreparedPipeline,
        ctx: &mut EvaluationContext<'_>,
        listener: &mut dyn EvaluationListener,
    ) {
        let message_id = ctx.message().id().to_string();
        let compiler = &self.config.compiler;
        listener.pipeline_started(&message_id, pipeline.id());

        for stage in pipeline.stages() {
            let mut results = Vec::with_capacity(stage.rules.len());
            for rule in &stage.rules {
                ctx.clear_vars();
                let matched = match rule.when(ctx, compiler) {
                    Ok(matched) => {
                        listener.rule_evaluated(&message_id, rule.name(), matched);
                        matched
                    }
                    Err(e) => {
                        warn!(rule = %rule.id(), error = %e, "rule evaluation failed");
                        listener.rule_failed(&message_id, rule.name(), &e);
                        false
                    }
                };
                results.push(matched);
            }

            let matched = stage.policy.decide(&results);
            trace!(pipeline = %pipeline.id(), stage = stage.number, matched, "stage evaluated");
            listener.stage_evaluated(&message_id, pipeline.id(), stage.number, matched);
            if !matched {
                break;
            }

            for (rule, _) in stage.rules.iter().zip(&results).filter(|(_, m)| **m) {
                ctx.clear_vars();
                match rule.then(ctx, compiler) {
                    Ok(()) => listener.rule_executed(&message_id, rule.name()),
                    Err(e) => {
                        warn!(rule = %rule.id(), error = %e, "rule statement failed");
                        listener.rule_execution_failed(&message_id, rule.name(), &e);
                    }
                }
            }

            if ctx.message().is_dropped() {
                debug!(message = %message_id, pipeline = %pipeline.id(), "message dropped");
                listener.message_dropped(&message_id);
                break;
            }
        }
        listener.pipeline_finished(&message_id, pipeline.id());
    }

    /// Evaluate a copy of `message` and record what happened. The
    /// caller's message is left untouched.
    pub fn simulate(
        &self,
        message: &Message,
        applicable: &Applicable,
    ) -> Result<Simulation, EngineError> {
        let mut copy = message.clone();
        let mut listener = RecordingListener::new();
        let created = self.evaluate_with(&mut copy, applicable, &mut listener)?;
        Ok(Simulation {
            message: copy,
            created,
            events: listener.into_events(),
        })
    }
}

impl std::fmt::Debug for PipelineEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.snapshot();
        f.debug_struct("PipelineEngine")
            .field("rules", &state.rule_count())
            .field("pipelines", &state.pipeline_count())
            .field("config", &self.config)
            .finish()
    }
}

fn policy(stage: StageMatch) -> MatchPolicy {
    match stage {
        StageMatch::All => MatchPolicy::All,
        StageMatch::Either => MatchPolicy::Either,
    }
}

/// Resolve a pipeline's rule names. Unknown names are reported and
/// skipped; the stage keeps its remaining rules.
fn link_pipeline(
    def: &PipelineDefinition,
    rules: &HashMap<String, Arc<PreparedRule>>,
    problems: &mut Vec<LoadProblem>,
) -> Result<PreparedPipeline, LoadProblem> {
    let mut stages = Vec::with_capacity(def.stages.len());
    for stage in &def.stages {
        let mut linked = Vec::with_capacity(stage.rules.len());
        for name in &stage.rules {
            match rules.get(name) {
                Some(rule) => linked.push(Arc::clone(rule)),
                None => {
                    warn!(pipeline = %def.id, stage = stage.stage, rule = %name, "unknown rule");
                    problems.push(LoadProblem::UnknownRule {
                        pipeline: def.id.clone(),
                        stage: stage.stage,
                        rule: name.clone(),
                    });
                }
            }
        }
        stages.push(Stage::new(stage.stage, policy(stage.match_policy), linked));
    }
    Pipeline::new(def.id.clone(), def.title.clone(), stages).map_err(|source| {
        LoadProblem::Pipeline {
            pipeline: def.id.clone(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::{ArithOp, RawExpr, RawStatement, RuleAst};
    use conduit_storage::{InMemoryStore, StageDefinition};
    use time::macros::datetime;

    use crate::parser::JsonRuleParser;

    fn rule_def(id: &str, ast: &RuleAst) -> RuleDefinition {
        RuleDefinition {
            id: id.to_string(),
            title: ast.name.clone(),
            description: None,
            source: serde_json::to_string(ast).unwrap(),
            modified_at: None,
        }
    }

    fn increment() -> RuleAst {
        RuleAst {
            name: "increment".to_string(),
            when: RawExpr::call("has_field", vec![RawExpr::string("field")]),
            then: vec![RawStatement::call(
                "set_field",
                vec![
                    RawExpr::string("field"),
                    RawExpr::arith(
                        ArithOp::Add,
                        RawExpr::call("to_long", vec![RawExpr::field("field")]),
                        RawExpr::long(1),
                    ),
                ],
            )],
        }
    }

    fn engine(store: Arc<InMemoryStore>) -> PipelineEngine {
        let engine = PipelineEngine::new(
            Arc::new(FunctionRegistry::with_builtins()),
            store.clone(),
            EngineConfig::default(),
        );
        let report = engine.reload(store.as_ref(), &JsonRuleParser).unwrap();
        assert!(report.is_clean(), "{:?}", report.problems);
        engine
    }

    fn store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store.save_rule(rule_def("r1", &increment()));
        store.save_pipeline(PipelineDefinition {
            id: "p1".to_string(),
            title: "main".to_string(),
            description: None,
            stages: vec![StageDefinition {
                stage: 0,
                match_policy: StageMatch::Either,
                rules: vec!["increment".to_string()],
            }],
        });
        store.connect("s1", ["p1".to_string()]);
        store
    }

    fn message() -> Message {
        Message::new("m", "test", datetime!(2025-01-01 00:00:00 UTC)).with_field("field", "5")
    }

    #[test]
    fn evaluates_connected_pipelines() {
        let engine = engine(store());
        let mut m = message();
        let created = engine
            .evaluate(&mut m, &Applicable::Streams(vec!["s1".to_string()]))
            .unwrap();
        assert!(created.is_empty());
        assert_eq!(m.field("field"), conduit_core::Value::Long(6));
    }

    #[test]
    fn explicit_pipelines_and_unknown_ids() {
        let engine = engine(store());
        let mut m = message();
        engine
            .evaluate(
                &mut m,
                &Applicable::Pipelines(vec!["nope".to_string(), "p1".to_string()]),
            )
            .unwrap();
        assert_eq!(m.field("field"), conduit_core::Value::Long(6));
    }

    #[test]
    fn reload_reports_broken_definitions() {
        let store = store();
        store.save_rule(RuleDefinition {
            id: "r2".to_string(),
            title: "broken".to_string(),
            description: None,
            source: "not json".to_string(),
            modified_at: None,
        });
        store.save_rule(rule_def("r3", &increment()));
        store.save_pipeline(PipelineDefinition {
            id: "p2".to_string(),
            title: "dangling".to_string(),
            description: None,
            stages: vec![StageDefinition {
                stage: 0,
                match_policy: StageMatch::All,
                rules: vec!["missing".to_string()],
            }],
        });
        let engine = PipelineEngine::new(
            Arc::new(FunctionRegistry::with_builtins()),
            store.clone(),
            EngineConfig::default(),
        );
        let report = engine.reload(store.as_ref(), &JsonRuleParser).unwrap();
        assert_eq!(report.rules_loaded, 1);
        assert_eq!(report.pipelines_loaded, 2);
        assert!(report
            .problems
            .iter()
            .any(|p| matches!(p, LoadProblem::Parse { id, .. } if id == "r2")));
        assert!(report
            .problems
            .iter()
            .any(|p| matches!(p, LoadProblem::DuplicateRuleName { .. })));
        assert!(report
            .problems
            .iter()
            .any(|p| matches!(p, LoadProblem::UnknownRule { rule, .. } if rule == "missing")));
    }

    #[test]
    fn simulate_leaves_the_message_alone() {
        let engine = engine(store());
        let m = message();
        let sim = engine
            .simulate(&m, &Applicable::Pipelines(vec!["p1".to_string()]))
            .unwrap();
        assert_eq!(m.field("field"), conduit_core::Value::from("5"));
        assert_eq!(sim.message.field("field"), conduit_core::Value::Long(6));
        assert!(sim
            .events
            .iter()
            .any(|e| matches!(e, EvaluationEvent::RuleExecuted { rule, .. } if rule == "increment")));
    }
}
