//! Closure compiler.
//!
//! Each expression node becomes a boxed closure over its compiled children,
//! so running a compiled rule does no arena lookups or node dispatch. The
//! closures reproduce the interpreter's semantics exactly, including the
//! rendered snippet in operator errors.
//!
//! Member and index access are not compiled. A rule that uses them fails
//! with [`CompileError::Unsupported`] and keeps running on the interpreter.

use std::collections::BTreeMap;
use std::sync::Arc;

use conduit_core::{ops, Expr, ExprId, LogicalOp, OpError, Statement, Value};

use crate::context::EvaluationContext;
use crate::error::{CompileError, EvalError};
use crate::function::{invoke, ArgSource};
use crate::message::MessageHandle;
use crate::prepared::PreparedRule;

pub type CompiledExpr =
    Box<dyn Fn(&mut EvaluationContext<'_>) -> Result<Value, EvalError> + Send + Sync>;

type CompiledStatement =
    Box<dyn Fn(&mut EvaluationContext<'_>) -> Result<(), EvalError> + Send + Sync>;

pub struct CompiledRule {
    when: CompiledExpr,
    then: Vec<CompiledStatement>,
}

impl CompiledRule {
    pub fn when(&self, ctx: &mut EvaluationContext<'_>) -> Result<bool, EvalError> {
        (self.when)(ctx).map(|v| v.as_bool().unwrap_or(false))
    }

    pub fn then(&self, ctx: &mut EvaluationContext<'_>) -> Result<(), EvalError> {
        self.then.iter().try_for_each(|stmt| stmt(ctx))
    }
}

pub fn compile(rule: &PreparedRule) -> Result<CompiledRule, CompileError> {
    let compiler = Compiler { rule };
    let when = compiler.condition(rule.rule().when())?;
    let then = rule
        .rule()
        .then()
        .iter()
        .map(|stmt| compiler.statement(stmt))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CompiledRule { when, then })
}

struct Compiler<'r> {
    rule: &'r PreparedRule,
}

fn expr_fn<F>(f: F) -> CompiledExpr
where
    F: Fn(&mut EvaluationContext<'_>) -> Result<Value, EvalError> + Send + Sync + 'static,
{
    Box::new(f)
}

fn stmt_fn<F>(f: F) -> CompiledStatement
where
    F: Fn(&mut EvaluationContext<'_>) -> Result<(), EvalError> + Send + Sync + 'static,
{
    Box::new(f)
}

fn op_error(snippet: &str, source: OpError) -> EvalError {
    EvalError::Operator {
        expr: snippet.to_string(),
        source,
    }
}

impl Compiler<'_> {
    fn snippet(&self, id: ExprId) -> Arc<str> {
        Arc::from(self.rule.rule().arena().render(id))
    }

    /// The `when` expression as a Boolean. Absent is false.
    fn condition(&self, id: ExprId) -> Result<CompiledExpr, CompileError> {
        let inner = self.expr(id)?;
        let snippet = self.snippet(id);
        Ok(expr_fn(move |ctx| {
            let value = inner(ctx)?;
            ops::truthy(&value)
                .map(Value::Bool)
                .map_err(|e| op_error(&snippet, e))
        }))
    }

    fn statement(&self, stmt: &Statement) -> Result<CompiledStatement, CompileError> {
        Ok(match stmt {
            Statement::Let { name, value } => {
                let value = self.expr(*value)?;
                let name = name.clone();
                stmt_fn(move |ctx| {
                    let v = value(ctx)?;
                    ctx.define(&name, v);
                    Ok(())
                })
            }
            Statement::Call(call) => {
                let call = self.expr(*call)?;
                stmt_fn(move |ctx| call(ctx).map(drop))
            }
        })
    }

    fn expr(&self, id: ExprId) -> Result<CompiledExpr, CompileError> {
        let rule = self.rule.rule();
        let ty = rule.type_of(id);
        Ok(match rule.expr(id) {
            Expr::Literal(lit) => {
                let value = lit.to_value();
                expr_fn(move |_| Ok(value.clone()))
            }
            Expr::Message => expr_fn(|_| Ok(MessageHandle::CURRENT.to_value())),
            Expr::Field(name) => {
                let name = name.clone();
                expr_fn(move |ctx| Ok(ctx.message().field(&name)))
            }
            Expr::Var(name) => {
                let name = name.clone();
                expr_fn(move |ctx| ctx.var(&name))
            }
            Expr::Unary { op, operand } => {
                let (op, operand, snippet) = (*op, self.expr(*operand)?, self.snippet(id));
                expr_fn(move |ctx| {
                    let v = operand(ctx)?;
                    ops::unary(op, &v).map_err(|e| op_error(&snippet, e))
                })
            }
            Expr::Arith { op, left, right } => {
                let (op, snippet) = (*op, self.snippet(id));
                let (left, right) = (self.expr(*left)?, self.expr(*right)?);
                expr_fn(move |ctx| {
                    let l = left(ctx)?;
                    let r = right(ctx)?;
                    ops::arith_typed(op, ty, &l, &r).map_err(|e| op_error(&snippet, e))
                })
            }
            Expr::Compare { op, left, right } => {
                let (op, snippet) = (*op, self.snippet(id));
                let (left, right) = (self.expr(*left)?, self.expr(*right)?);
                expr_fn(move |ctx| {
                    let l = left(ctx)?;
                    let r = right(ctx)?;
                    ops::compare(op, &l, &r).map_err(|e| op_error(&snippet, e))
                })
            }
            Expr::Logical { op, left, right } => {
                let snippet = self.snippet(id);
                let (left, right) = (self.expr(*left)?, self.expr(*right)?);
                let short_circuit = match op {
                    LogicalOp::And => false,
                    LogicalOp::Or => true,
                };
                expr_fn(move |ctx| {
                    let l = ops::truthy(&left(ctx)?).map_err(|e| op_error(&snippet, e))?;
                    if l == short_circuit {
                        return Ok(Value::Bool(l));
                    }
                    ops::truthy(&right(ctx)?)
                        .map(Value::Bool)
                        .map_err(|e| op_error(&snippet, e))
                })
            }
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                let snippet = self.snippet(id);
                let condition = self.expr(*condition)?;
                let (then, otherwise) = (self.expr(*then)?, self.expr(*otherwise)?);
                expr_fn(move |ctx| {
                    let c = condition(ctx)?;
                    if c.is_null() {
                        return Ok(Value::Null);
                    }
                    let value = if ops::truthy(&c).map_err(|e| op_error(&snippet, e))? {
                        then(ctx)?
                    } else {
                        otherwise(ctx)?
                    };
                    Ok(ops::coerce(value, ty))
                })
            }
            Expr::List(items) => {
                let items = items
                    .iter()
                    .map(|item| self.expr(*item))
                    .collect::<Result<Vec<_>, _>>()?;
                expr_fn(move |ctx| {
                    items
                        .iter()
                        .map(|item| item(ctx))
                        .collect::<Result<Vec<_>, _>>()
                        .map(Value::List)
                })
            }
            Expr::Map(entries) => {
                let mut compiled = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    compiled.push((key.clone(), self.expr(*value)?));
                }
                let entries = compiled;
                expr_fn(move |ctx| {
                    let mut map = BTreeMap::new();
                    for (key, value) in &entries {
                        map.insert(key.clone(), value(ctx)?);
                    }
                    Ok(Value::Map(map))
                })
            }
            Expr::Member { .. } => return Err(CompileError::Unsupported { node: "member" }),
            Expr::Index { .. } => return Err(CompileError::Unsupported { node: "index" }),
            Expr::Call { function, args } => {
                let Some(call) = self.rule.call(id) else {
                    let function = function.clone();
                    return Ok(expr_fn(move |_| {
                        Err(EvalError::function(&function, "call was not prepared"))
                    }));
                };
                let function = Arc::clone(&call.function);
                let precomputed = call.precomputed.clone();
                let args = args
                    .iter()
                    .map(|arg| arg.map(|a| self.expr(a)).transpose())
                    .collect::<Result<Vec<_>, _>>()?;
                expr_fn(move |ctx| {
                    let source = ClosureArgs(&args);
                    invoke(function.as_ref(), &source, &precomputed, ctx)
                })
            }
        })
    }
}

struct ClosureArgs<'a>(&'a [Option<CompiledExpr>]);

impl ArgSource for ClosureArgs<'_> {
    fn evaluate(
        &self,
        position: usize,
        ctx: &mut EvaluationContext<'_>,
    ) -> Option<Result<Value, EvalError>> {
        let arg = self.0.get(position)?.as_ref()?;
        Some(arg(ctx))
    }
}
