//! Constant folding.
//!
//! Runs after type resolution. Operator nodes whose operands are all
//! constant are evaluated once and replaced in place by a literal. Nodes
//! that would fail (integer division by zero) are left alone so the error
//! still surfaces at evaluation time, and containers are never turned into
//! literals.

use tracing::trace;

use crate::ast::{Expr, ExprArena, ExprId};
use crate::ops;
use crate::typecheck::TypeTable;
use crate::value::{Literal, Value};

/// Fold every constant operator subtree. Returns the number of nodes
/// replaced.
pub(crate) fn fold_constants(arena: &mut ExprArena, types: &TypeTable) -> usize {
    let mut folded = 0;
    // children precede parents, so one forward pass folds bottom-up
    for index in 0..arena.len() {
        let id = ExprId::from_index(index);
        let foldable = matches!(
            arena.get(id),
            Expr::Unary { .. }
                | Expr::Arith { .. }
                | Expr::Compare { .. }
                | Expr::Logical { .. }
                | Expr::Ternary { .. }
        );
        if !foldable || !arena.is_constant(id) {
            continue;
        }
        let Some(value) = const_value(arena, types, id) else {
            continue;
        };
        if let Some(literal) = Literal::from_value(&value) {
            trace!(node = %id, value = %literal, "folded constant");
            arena.replace(id, Expr::Literal(literal));
            folded += 1;
        }
    }
    folded
}

fn const_value(arena: &ExprArena, types: &TypeTable, id: ExprId) -> Option<Value> {
    let value = match arena.get(id) {
        Expr::Literal(lit) => lit.to_value(),
        Expr::Unary { op, operand } => {
            ops::unary(*op, &const_value(arena, types, *operand)?).ok()?
        }
        Expr::Arith { op, left, right } => {
            let l = const_value(arena, types, *left)?;
            let r = const_value(arena, types, *right)?;
            ops::arith_typed(*op, types.get(id), &l, &r).ok()?
        }
        Expr::Compare { op, left, right } => {
            let l = const_value(arena, types, *left)?;
            let r = const_value(arena, types, *right)?;
            ops::compare(*op, &l, &r).ok()?
        }
        Expr::Logical { op, left, right } => {
            let l = ops::truthy(&const_value(arena, types, *left)?).ok()?;
            let short = match op {
                crate::ast::LogicalOp::And => !l,
                crate::ast::LogicalOp::Or => l,
            };
            if short {
                Value::Bool(l)
            } else {
                Value::Bool(ops::truthy(&const_value(arena, types, *right)?).ok()?)
            }
        }
        Expr::Ternary {
            condition,
            then,
            otherwise,
        } => {
            let branch = if ops::truthy(&const_value(arena, types, *condition)?).ok()? {
                *then
            } else {
                *otherwise
            };
            ops::coerce(const_value(arena, types, branch)?, types.get(id))
        }
        Expr::List(items) => Value::List(
            items
                .iter()
                .map(|item| const_value(arena, types, *item))
                .collect::<Option<Vec<_>>>()?,
        ),
        Expr::Map(entries) => {
            let mut map = std::collections::BTreeMap::new();
            for (key, value) in entries {
                map.insert(key.clone(), const_value(arena, types, *value)?);
            }
            Value::Map(map)
        }
        _ => return None,
    };
    Some(value)
}
