//! Rules bound to a function registry, ready to run.
//!
//! Preparing a rule resolves every call to its function and runs argument
//! transforms over constant arguments once, so a pattern literal is compiled
//! when the rule loads rather than on every message. A prepared rule also
//! owns its compiled form, created lazily once the rule has run often
//! enough.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use conduit_core::{ops, Expr, ExprId, Rule, Value};
use tracing::debug;

use crate::compiler::{compile, CompiledRule};
use crate::config::CompilerConfig;
use crate::context::EvaluationContext;
use crate::error::{EvalError, PrepareError};
use crate::function::{Function, FunctionRegistry};
use crate::interpreter::Interpreter;

pub struct PreparedCall {
    pub function: Arc<dyn Function>,
    /// Transformed constant arguments, by parameter position.
    pub precomputed: Vec<Option<Value>>,
}

pub struct PreparedRule {
    rule: Arc<Rule>,
    /// Indexed by expression id; `Some` exactly for call nodes.
    calls: Vec<Option<PreparedCall>>,
    executions: AtomicU64,
    compiled: OnceLock<Option<CompiledRule>>,
}

impl PreparedRule {
    pub fn prepare(rule: Arc<Rule>, registry: &FunctionRegistry) -> Result<Self, PrepareError> {
        let mut calls: Vec<Option<PreparedCall>> = Vec::new();
        calls.resize_with(rule.arena().len(), || None);
        for id in rule.calls() {
            let Expr::Call { function, args } = rule.expr(id) else {
                continue;
            };
            let resolved = registry
                .get(function)
                .ok_or_else(|| PrepareError::UnknownFunction {
                    name: function.clone(),
                })?;
            let descriptor = resolved.descriptor();
            let mut precomputed = vec![None; descriptor.params().len()];
            for (position, param) in descriptor.params().iter().enumerate() {
                let Some(transform) = param.transformer() else {
                    continue;
                };
                let Some(Some(arg)) = args.get(position) else {
                    continue;
                };
                let Expr::Literal(literal) = rule.expr(*arg) else {
                    continue;
                };
                let value = ops::coerce(literal.to_value(), param.ty());
                let value = transform(value).map_err(|message| PrepareError::ConstantArgument {
                    function: function.clone(),
                    argument: param.name().to_string(),
                    message,
                })?;
                precomputed[position] = Some(value);
            }
            calls[id.index()] = Some(PreparedCall {
                function: Arc::clone(resolved),
                precomputed,
            });
        }
        Ok(PreparedRule {
            rule,
            calls,
            executions: AtomicU64::new(0),
            compiled: OnceLock::new(),
        })
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn id(&self) -> &str {
        self.rule.id()
    }

    pub fn name(&self) -> &str {
        self.rule.name()
    }

    pub fn call(&self, id: ExprId) -> Option<&PreparedCall> {
        self.calls.get(id.index()).and_then(Option::as_ref)
    }

    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    /// Whether a compiled form exists and is in use.
    pub fn is_compiled(&self) -> bool {
        matches!(self.compiled.get(), Some(Some(_)))
    }

    /// Compile immediately, regardless of the execution count. Returns
    /// whether the rule now runs compiled.
    pub fn compile_now(&self) -> bool {
        self.compiled
            .get_or_init(|| match compile(self) {
                Ok(compiled) => {
                    debug!(rule = self.name(), "rule compiled");
                    Some(compiled)
                }
                Err(e) => {
                    debug!(rule = self.name(), error = %e, "rule stays interpreted");
                    None
                }
            })
            .is_some()
    }

    /// The compiled form, compiling first once `executed` reaches the
    /// threshold.
    fn compiled(&self, config: &CompilerConfig, executed: u64) -> Option<&CompiledRule> {
        if !config.enabled {
            return None;
        }
        if self.compiled.get().is_none() && executed >= config.threshold {
            self.compile_now();
        }
        self.compiled.get().and_then(Option::as_ref)
    }

    /// Evaluate `when`, compiled if possible. Counts as one execution.
    pub fn when(
        &self,
        ctx: &mut EvaluationContext<'_>,
        config: &CompilerConfig,
    ) -> Result<bool, EvalError> {
        let executed = self.executions.fetch_add(1, Ordering::Relaxed);
        match self.compiled(config, executed) {
            Some(compiled) => compiled.when(ctx),
            None => Interpreter::new(self).when(ctx),
        }
    }

    /// Run the `then` statements, compiled if `when` already switched the
    /// rule over.
    pub fn then(
        &self,
        ctx: &mut EvaluationContext<'_>,
        config: &CompilerConfig,
    ) -> Result<(), EvalError> {
        let compiled = self.compiled.get().and_then(Option::as_ref);
        match compiled.filter(|_| config.enabled) {
            Some(compiled) => compiled.then(ctx),
            None => Interpreter::new(self).then(ctx),
        }
    }
}

impl std::fmt::Debug for PreparedRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedRule")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("executions", &self.executions())
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::{CompareOp, RawExpr, RawStatement, RuleAst};
    use time::macros::datetime;

    use crate::message::Message;

    fn build(ast: &RuleAst) -> PreparedRule {
        let registry = FunctionRegistry::with_builtins();
        let rule = Rule::build("r1", ast, &registry).unwrap();
        PreparedRule::prepare(Arc::new(rule), &registry).unwrap()
    }

    fn regex_rule(pattern: &str) -> RuleAst {
        RuleAst {
            name: "regex".to_string(),
            when: RawExpr::compare(
                CompareOp::Eq,
                RawExpr::member(
                    RawExpr::call(
                        "regex",
                        vec![RawExpr::string(pattern), RawExpr::field("message")],
                    ),
                    "matches",
                ),
                RawExpr::bool(true),
            ),
            then: vec![RawStatement::call(
                "set_field",
                vec![RawExpr::string("matched"), RawExpr::bool(true)],
            )],
        }
    }

    #[test]
    fn constant_pattern_is_compiled_at_prepare_time() {
        let prepared = build(&RuleAst {
            name: "regex".to_string(),
            when: RawExpr::bool(true),
            then: vec![RawStatement::let_(
                "m",
                RawExpr::call("regex", vec![RawExpr::string("a+"), RawExpr::string("aa")]),
            )],
        });
        let call = prepared.rule().calls()[0];
        let pre = &prepared.call(call).unwrap().precomputed;
        assert!(matches!(pre[0], Some(Value::Object(_))));
        assert!(pre[1].is_none());
    }

    #[test]
    fn invalid_constant_pattern_fails_preparation() {
        let registry = FunctionRegistry::with_builtins();
        let rule = Rule::build("r1", &regex_rule("("), &registry).unwrap();
        let err = PreparedRule::prepare(Arc::new(rule), &registry).unwrap_err();
        assert!(matches!(err, PrepareError::ConstantArgument { .. }));
    }

    #[test]
    fn member_access_keeps_the_rule_interpreted() {
        let prepared = build(&regex_rule("h.*"));
        let config = CompilerConfig {
            enabled: true,
            threshold: 0,
        };
        let mut m = Message::new("hello", "test", datetime!(2025-01-01 00:00:00 UTC));
        let mut ctx = EvaluationContext::new(&mut m);
        assert_eq!(prepared.when(&mut ctx, &config), Ok(true));
        prepared.then(&mut ctx, &config).unwrap();
        assert!(!prepared.is_compiled());
        assert_eq!(ctx.message().field("matched"), Value::Bool(true));
    }

    #[test]
    fn compiles_after_threshold() {
        let prepared = build(&RuleAst {
            name: "count".to_string(),
            when: RawExpr::call("has_field", vec![RawExpr::string("message")]),
            then: vec![],
        });
        let config = CompilerConfig {
            enabled: true,
            threshold: 2,
        };
        let mut m = Message::new("hello", "test", datetime!(2025-01-01 00:00:00 UTC));
        let mut ctx = EvaluationContext::new(&mut m);
        for _ in 0..2 {
            assert_eq!(prepared.when(&mut ctx, &config), Ok(true));
            assert!(!prepared.is_compiled());
        }
        assert_eq!(prepared.when(&mut ctx, &config), Ok(true));
        assert!(prepared.is_compiled());
        assert_eq!(prepared.executions(), 3);
    }

    #[test]
    fn disabled_compiler_never_compiles() {
        let prepared = build(&RuleAst {
            name: "count".to_string(),
            when: RawExpr::bool(true),
            then: vec![],
        });
        let config = CompilerConfig {
            enabled: false,
            threshold: 0,
        };
        let mut m = Message::new("hello", "test", datetime!(2025-01-01 00:00:00 UTC));
        let mut ctx = EvaluationContext::new(&mut m);
        assert_eq!(prepared.when(&mut ctx, &config), Ok(true));
        assert!(!prepared.is_compiled());
    }
}
