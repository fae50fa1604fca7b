//! Type resolution.
//!
//! Runs once over a freshly lowered rule and records the static type of
//! every reachable node in a [`TypeTable`] indexed by [`ExprId`]. The
//! evaluator only reads this table; nothing is resolved lazily while
//! messages are being processed.

use std::collections::HashMap;

use crate::ast::{ArithOp, CompareOp, Expr, ExprArena, ExprId, LogicalOp, Statement, UnaryOp};
use crate::error::{TypeError, TypeErrorKind};
use crate::signature::FunctionTable;
use crate::value::ValueType;

/// Binary operator families as far as typing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Arith(ArithOp),
    Compare(CompareOp),
    Logical(LogicalOp),
}

/// Result type of a binary operator applied to operands of the given types.
///
/// Arithmetic needs two numeric operands and yields `Long` only when both
/// are `Long`. Comparisons always yield `Boolean`: equality is defined for
/// equal types, any two numbers and anything against `Any`; ordering for
/// two numbers or two strings. Logical operators need two booleans.
pub fn promote(left: ValueType, right: ValueType, op: BinaryOp) -> Result<ValueType, TypeErrorKind> {
    match op {
        BinaryOp::Arith(op) => {
            if left.is_numeric() && right.is_numeric() {
                if left == ValueType::Long && right == ValueType::Long {
                    Ok(ValueType::Long)
                } else {
                    Ok(ValueType::Double)
                }
            } else {
                Err(TypeErrorKind::Arithmetic {
                    op: op.symbol(),
                    left,
                    right,
                })
            }
        }
        BinaryOp::Compare(op) => {
            let comparable = if op.is_equality() {
                left == right
                    || (left.is_numeric() && right.is_numeric())
                    || left == ValueType::Any
                    || right == ValueType::Any
            } else {
                (left.is_numeric() && right.is_numeric())
                    || (left == ValueType::String && right == ValueType::String)
            };
            if comparable && left != ValueType::Void && right != ValueType::Void {
                Ok(ValueType::Boolean)
            } else {
                Err(TypeErrorKind::Comparison {
                    op: op.symbol(),
                    left,
                    right,
                })
            }
        }
        BinaryOp::Logical(op) => {
            for found in [left, right] {
                if found != ValueType::Boolean {
                    return Err(TypeErrorKind::Logical {
                        op: op.symbol(),
                        found,
                    });
                }
            }
            Ok(ValueType::Boolean)
        }
    }
}

// ──────────────────────────────────────────────
// Type table
// ──────────────────────────────────────────────

/// Side table of resolved types, one slot per arena node.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeTable {
    types: Vec<Option<ValueType>>,
}

impl TypeTable {
    fn with_len(len: usize) -> Self {
        TypeTable {
            types: vec![None; len],
        }
    }

    /// Resolved type of a node. Nodes orphaned by constant folding keep
    /// their last type; unreachable nodes report `Any`.
    pub fn get(&self, id: ExprId) -> ValueType {
        self.types
            .get(id.index())
            .copied()
            .flatten()
            .unwrap_or(ValueType::Any)
    }

    fn set(&mut self, id: ExprId, ty: ValueType) {
        self.types[id.index()] = Some(ty);
    }
}

// ──────────────────────────────────────────────
// Resolution pass
// ──────────────────────────────────────────────

pub(crate) struct Resolver<'a> {
    arena: &'a ExprArena,
    functions: &'a dyn FunctionTable,
    table: TypeTable,
    scope: HashMap<String, ValueType>,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(arena: &'a ExprArena, functions: &'a dyn FunctionTable) -> Self {
        Resolver {
            arena,
            functions,
            table: TypeTable::with_len(arena.len()),
            scope: HashMap::new(),
        }
    }

    pub(crate) fn when(&mut self, id: ExprId) -> Result<(), TypeError> {
        let ty = self.value(id)?;
        if ty != ValueType::Boolean {
            return Err(self.error(id, TypeErrorKind::When { found: ty }));
        }
        Ok(())
    }

    /// Statements are resolved in order so a variable is only visible to
    /// the statements after its declaration.
    pub(crate) fn statement(&mut self, stmt: &Statement) -> Result<(), TypeError> {
        match stmt {
            Statement::Let { name, value } => {
                let ty = self.value(*value)?;
                self.scope.insert(name.clone(), ty);
            }
            Statement::Call(call) => {
                self.resolve(*call)?;
            }
        }
        Ok(())
    }

    pub(crate) fn finish(self) -> TypeTable {
        self.table
    }

    fn error(&self, id: ExprId, kind: TypeErrorKind) -> TypeError {
        TypeError {
            expr: id,
            snippet: self.arena.render(id),
            kind,
        }
    }

    /// Resolve a node that is used as a value, which rules out `Void`.
    fn value(&mut self, id: ExprId) -> Result<ValueType, TypeError> {
        let ty = self.resolve(id)?;
        if ty == ValueType::Void {
            let function = match self.arena.get(id) {
                Expr::Call { function, .. } => function.clone(),
                other => other.kind().to_string(),
            };
            return Err(self.error(id, TypeErrorKind::VoidValue { function }));
        }
        Ok(ty)
    }

    fn resolve(&mut self, id: ExprId) -> Result<ValueType, TypeError> {
        let ty = match self.arena.get(id) {
            Expr::Literal(lit) => lit.value_type(),
            Expr::Message => ValueType::Object,
            Expr::Field(_) => ValueType::Any,
            Expr::Var(name) => match self.scope.get(name) {
                Some(ty) => *ty,
                None => {
                    return Err(self.error(
                        id,
                        TypeErrorKind::UnknownVariable { name: name.clone() },
                    ))
                }
            },
            Expr::Unary { op, operand } => {
                let found = self.value(*operand)?;
                let ok = match op {
                    UnaryOp::Not => found == ValueType::Boolean,
                    UnaryOp::Negate | UnaryOp::Plus => found.is_numeric(),
                };
                if !ok {
                    return Err(self.error(
                        id,
                        TypeErrorKind::Unary {
                            op: op.symbol(),
                            found,
                        },
                    ));
                }
                found
            }
            Expr::Arith { op, left, right } => {
                self.binary(id, *left, *right, BinaryOp::Arith(*op))?
            }
            Expr::Compare { op, left, right } => {
                self.binary(id, *left, *right, BinaryOp::Compare(*op))?
            }
            Expr::Logical { op, left, right } => {
                self.binary(id, *left, *right, BinaryOp::Logical(*op))?
            }
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                let found = self.value(*condition)?;
                if found != ValueType::Boolean {
                    return Err(self.error(id, TypeErrorKind::Condition { found }));
                }
                let a = self.value(*then)?;
                let b = self.value(*otherwise)?;
                if a == b {
                    a
                } else if a.is_numeric() && b.is_numeric() {
                    ValueType::Double
                } else {
                    ValueType::Any
                }
            }
            Expr::List(items) => {
                for item in items {
                    self.value(*item)?;
                }
                ValueType::List
            }
            Expr::Map(entries) => {
                for (_, value) in entries {
                    self.value(*value)?;
                }
                ValueType::Map
            }
            Expr::Member { target, .. } => {
                let found = self.value(*target)?;
                if !matches!(found, ValueType::Map | ValueType::Object | ValueType::Any) {
                    return Err(self.error(id, TypeErrorKind::Member { found }));
                }
                ValueType::Any
            }
            Expr::Index { target, index } => {
                let target_ty = self.value(*target)?;
                let index_ty = self.value(*index)?;
                let ok = match target_ty {
                    ValueType::List => ValueType::Long.accepts(index_ty),
                    ValueType::Map => ValueType::String.accepts(index_ty),
                    ValueType::Object | ValueType::Any => true,
                    _ => false,
                };
                if !ok {
                    return Err(self.error(
                        id,
                        TypeErrorKind::Index {
                            target: target_ty,
                            index: index_ty,
                        },
                    ));
                }
                ValueType::Any
            }
            Expr::Call { function, args } => {
                let functions = self.functions;
                // lowering resolved every name against the same table
                let Some(signature) = functions.signature(function) else {
                    self.table.set(id, ValueType::Any);
                    return Ok(ValueType::Any);
                };
                for (param, arg) in signature.params.iter().zip(args) {
                    let Some(arg) = arg else { continue };
                    let found = self.value(*arg)?;
                    if !param.ty.accepts(found) {
                        return Err(self.error(
                            *arg,
                            TypeErrorKind::Argument {
                                function: function.clone(),
                                parameter: param.name.clone(),
                                expected: param.ty,
                                found,
                            },
                        ));
                    }
                }
                signature.return_type
            }
        };
        self.table.set(id, ty);
        Ok(ty)
    }

    fn binary(
        &mut self,
        id: ExprId,
        left: ExprId,
        right: ExprId,
        op: BinaryOp,
    ) -> Result<ValueType, TypeError> {
        let l = self.value(left)?;
        let r = self.value(right)?;
        promote(l, r, op).map_err(|kind| self.error(id, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    const NUMERIC: [ValueType; 2] = [ValueType::Long, ValueType::Double];

    #[test]
    fn long_plus_long_is_long() {
        let t = promote(ValueType::Long, ValueType::Long, BinaryOp::Arith(ArithOp::Add));
        assert_eq!(t, Ok(ValueType::Long));
    }

    #[test]
    fn mixed_arithmetic_is_double() {
        for op in [ArithOp::Add, ArithOp::Sub, ArithOp::Mul, ArithOp::Div, ArithOp::Mod] {
            assert_eq!(
                promote(ValueType::Long, ValueType::Double, BinaryOp::Arith(op)),
                Ok(ValueType::Double)
            );
            assert_eq!(
                promote(ValueType::Double, ValueType::Long, BinaryOp::Arith(op)),
                Ok(ValueType::Double)
            );
        }
    }

    #[test]
    fn arithmetic_on_strings_is_rejected() {
        let err = promote(ValueType::String, ValueType::Long, BinaryOp::Arith(ArithOp::Add))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "operator '+' needs numeric operands, got String and Long"
        );
    }

    #[test]
    fn arithmetic_on_any_is_rejected() {
        assert!(promote(ValueType::Any, ValueType::Long, BinaryOp::Arith(ArithOp::Add)).is_err());
    }

    #[test]
    fn ordering_needs_matching_kinds() {
        let lt = BinaryOp::Compare(CompareOp::Lt);
        assert_eq!(promote(ValueType::String, ValueType::String, lt), Ok(ValueType::Boolean));
        assert_eq!(promote(ValueType::Long, ValueType::Double, lt), Ok(ValueType::Boolean));
        assert!(promote(ValueType::Boolean, ValueType::Boolean, lt).is_err());
        assert!(promote(ValueType::String, ValueType::Long, lt).is_err());
        assert!(promote(ValueType::Any, ValueType::Long, lt).is_err());
    }

    #[test]
    fn equality_accepts_any() {
        let eq = BinaryOp::Compare(CompareOp::Eq);
        assert_eq!(promote(ValueType::Any, ValueType::String, eq), Ok(ValueType::Boolean));
        assert_eq!(promote(ValueType::Boolean, ValueType::Boolean, eq), Ok(ValueType::Boolean));
        assert!(promote(ValueType::Boolean, ValueType::String, eq).is_err());
    }

    #[test]
    fn logical_needs_booleans() {
        let and = BinaryOp::Logical(LogicalOp::And);
        assert_eq!(promote(ValueType::Boolean, ValueType::Boolean, and), Ok(ValueType::Boolean));
        assert!(promote(ValueType::Boolean, ValueType::Any, and).is_err());
    }

    proptest! {
        #[test]
        fn arithmetic_result_is_long_only_for_two_longs(
            l in 0usize..2, r in 0usize..2, op in 0usize..5
        ) {
            let ops = [ArithOp::Add, ArithOp::Sub, ArithOp::Mul, ArithOp::Div, ArithOp::Mod];
            let (lt, rt) = (NUMERIC[l], NUMERIC[r]);
            let expected = if lt == ValueType::Long && rt == ValueType::Long {
                ValueType::Long
            } else {
                ValueType::Double
            };
            prop_assert_eq!(promote(lt, rt, BinaryOp::Arith(ops[op])), Ok(expected));
        }
    }
}
