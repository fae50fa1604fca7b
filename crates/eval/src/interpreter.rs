//! Tree-walking evaluation of a prepared rule.
//!
//! This is the reference semantics; the closure compiler must agree with it
//! on every input.

use std::collections::BTreeMap;

use conduit_core::{ops, Expr, ExprId, LogicalOp, OpError, Statement, Value};

use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::function::{invoke, ArgSource};
use crate::message::MessageHandle;
use crate::prepared::PreparedRule;

pub struct Interpreter<'r> {
    rule: &'r PreparedRule,
}

impl<'r> Interpreter<'r> {
    pub fn new(rule: &'r PreparedRule) -> Self {
        Interpreter { rule }
    }

    /// Evaluate the `when` expression. Absent counts as false.
    pub fn when(&self, ctx: &mut EvaluationContext<'_>) -> Result<bool, EvalError> {
        let id = self.rule.rule().when();
        let value = self.eval(id, ctx)?;
        ops::truthy(&value).map_err(|e| self.op_error(id, e))
    }

    /// Run the `then` statements in order, stopping at the first failure.
    pub fn then(&self, ctx: &mut EvaluationContext<'_>) -> Result<(), EvalError> {
        for stmt in self.rule.rule().then() {
            match stmt {
                Statement::Let { name, value } => {
                    let value = self.eval(*value, ctx)?;
                    ctx.define(name, value);
                }
                Statement::Call(call) => {
                    self.eval(*call, ctx)?;
                }
            }
        }
        Ok(())
    }

    fn op_error(&self, id: ExprId, source: OpError) -> EvalError {
        EvalError::Operator {
            expr: self.rule.rule().arena().render(id),
            source,
        }
    }

    pub fn eval(&self, id: ExprId, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvalError> {
        let rule = self.rule.rule();
        match rule.expr(id) {
            Expr::Literal(lit) => Ok(lit.to_value()),
            Expr::Message => Ok(MessageHandle::CURRENT.to_value()),
            Expr::Field(name) => Ok(ctx.message().field(name)),
            Expr::Var(name) => ctx.var(name),
            Expr::Unary { op, operand } => {
                let value = self.eval(*operand, ctx)?;
                ops::unary(*op, &value).map_err(|e| self.op_error(id, e))
            }
            Expr::Arith { op, left, right } => {
                let l = self.eval(*left, ctx)?;
                let r = self.eval(*right, ctx)?;
                ops::arith_typed(*op, rule.type_of(id), &l, &r).map_err(|e| self.op_error(id, e))
            }
            Expr::Compare { op, left, right } => {
                let l = self.eval(*left, ctx)?;
                let r = self.eval(*right, ctx)?;
                ops::compare(*op, &l, &r).map_err(|e| self.op_error(id, e))
            }
            Expr::Logical { op, left, right } => {
                let l = self.eval(*left, ctx)?;
                let l = ops::truthy(&l).map_err(|e| self.op_error(id, e))?;
                match (op, l) {
                    (LogicalOp::And, false) => return Ok(Value::Bool(false)),
                    (LogicalOp::Or, true) => return Ok(Value::Bool(true)),
                    _ => {}
                }
                let r = self.eval(*right, ctx)?;
                ops::truthy(&r)
                    .map(Value::Bool)
                    .map_err(|e| self.op_error(id, e))
            }
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                let c = self.eval(*condition, ctx)?;
                if c.is_null() {
                    return Ok(Value::Null);
                }
                let branch = if ops::truthy(&c).map_err(|e| self.op_error(id, e))? {
                    *then
                } else {
                    *otherwise
                };
                let value = self.eval(branch, ctx)?;
                Ok(ops::coerce(value, rule.type_of(id)))
            }
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(*item, ctx))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Expr::Map(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.eval(*value, ctx)?);
                }
                Ok(Value::Map(map))
            }
            Expr::Member { target, name } => {
                let target = self.eval(*target, ctx)?;
                ops::member(&target, name).map_err(|e| self.op_error(id, e))
            }
            Expr::Index { target, index } => {
                let target = self.eval(*target, ctx)?;
                let index = self.eval(*index, ctx)?;
                ops::index(&target, &index).map_err(|e| self.op_error(id, e))
            }
            Expr::Call { function, args } => {
                let call = self
                    .rule
                    .call(id)
                    .ok_or_else(|| EvalError::function(function, "call was not prepared"))?;
                let source = ArenaArgs { interp: self, args };
                invoke(call.function.as_ref(), &source, &call.precomputed, ctx)
            }
        }
    }
}

/// Call arguments bound to arena nodes.
struct ArenaArgs<'a, 'r> {
    interp: &'a Interpreter<'r>,
    args: &'a [Option<ExprId>],
}

impl ArgSource for ArenaArgs<'_, '_> {
    fn evaluate(
        &self,
        position: usize,
        ctx: &mut EvaluationContext<'_>,
    ) -> Option<Result<Value, EvalError>> {
        let id = self.args.get(position).copied().flatten()?;
        Some(self.interp.eval(id, ctx))
    }
}
