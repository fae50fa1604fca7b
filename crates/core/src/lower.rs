//! Lowering of raw syntax into the arena AST.
//!
//! Function names are resolved here and call-site arguments (positional
//! or named) are bound to the parameter positions of the signature, so an
//! unknown function or a malformed call never reaches evaluation.

use crate::ast::{Expr, ExprArena, ExprId, Statement};
use crate::error::BuildError;
use crate::signature::FunctionTable;
use crate::syntax::{RawArg, RawExpr, RawStatement};

pub(crate) struct Lowering<'a> {
    pub(crate) arena: ExprArena,
    functions: &'a dyn FunctionTable,
}

impl<'a> Lowering<'a> {
    pub(crate) fn new(functions: &'a dyn FunctionTable) -> Self {
        Lowering {
            arena: ExprArena::new(),
            functions,
        }
    }

    pub(crate) fn statement(&mut self, raw: &RawStatement) -> Result<Statement, BuildError> {
        match raw {
            RawStatement::Let { name, value } => Ok(Statement::Let {
                name: name.clone(),
                value: self.expr(value)?,
            }),
            RawStatement::Call { function, args } => {
                let call = self.call(function, args)?;
                Ok(Statement::Call(call))
            }
        }
    }

    pub(crate) fn expr(&mut self, raw: &RawExpr) -> Result<ExprId, BuildError> {
        let node = match raw {
            RawExpr::Literal { value } => Expr::Literal(value.clone()),
            RawExpr::Message => Expr::Message,
            RawExpr::Field { name } => Expr::Field(name.clone()),
            RawExpr::Var { name } => Expr::Var(name.clone()),
            RawExpr::Unary { op, operand } => Expr::Unary {
                op: *op,
                operand: self.expr(operand)?,
            },
            RawExpr::Arith { op, left, right } => {
                let left = self.expr(left)?;
                let right = self.expr(right)?;
                Expr::Arith { op: *op, left, right }
            }
            RawExpr::Compare { op, left, right } => {
                let left = self.expr(left)?;
                let right = self.expr(right)?;
                Expr::Compare { op: *op, left, right }
            }
            RawExpr::Logical { op, left, right } => {
                let left = self.expr(left)?;
                let right = self.expr(right)?;
                Expr::Logical { op: *op, left, right }
            }
            RawExpr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.expr(condition)?;
                let then = self.expr(then)?;
                let otherwise = self.expr(otherwise)?;
                Expr::Ternary {
                    condition,
                    then,
                    otherwise,
                }
            }
            RawExpr::List { items } => {
                let ids = items
                    .iter()
                    .map(|item| self.expr(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Expr::List(ids)
            }
            RawExpr::Map { entries } => {
                let mut ids = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    ids.push((key.clone(), self.expr(value)?));
                }
                Expr::Map(ids)
            }
            RawExpr::Member { target, name } => Expr::Member {
                target: self.expr(target)?,
                name: name.clone(),
            },
            RawExpr::Index { target, index } => {
                let target = self.expr(target)?;
                let index = self.expr(index)?;
                Expr::Index { target, index }
            }
            RawExpr::Call { function, args } => return self.call(function, args),
        };
        Ok(self.arena.alloc(node))
    }

    fn call(&mut self, function: &str, args: &[RawArg]) -> Result<ExprId, BuildError> {
        let functions = self.functions;
        let signature = functions
            .signature(function)
            .ok_or_else(|| BuildError::UnknownFunction {
                name: function.to_string(),
            })?;
        let params = &signature.params;

        let mut slots: Vec<Option<&RawExpr>> = vec![None; params.len()];
        let mut seen_named = false;
        let positional_count = args.iter().filter(|a| a.name.is_none()).count();

        for (position, arg) in args.iter().enumerate() {
            let slot = match &arg.name {
                None => {
                    if seen_named {
                        return Err(BuildError::PositionalAfterNamed {
                            function: function.to_string(),
                        });
                    }
                    if position >= params.len() {
                        return Err(BuildError::TooManyArguments {
                            function: function.to_string(),
                            expected: params.len(),
                            found: positional_count,
                        });
                    }
                    position
                }
                Some(name) => {
                    seen_named = true;
                    signature
                        .param_index(name)
                        .ok_or_else(|| BuildError::UnknownParameter {
                            function: function.to_string(),
                            parameter: name.clone(),
                        })?
                }
            };
            if slots[slot].is_some() {
                return Err(BuildError::DuplicateArgument {
                    function: function.to_string(),
                    parameter: params[slot].name.clone(),
                });
            }
            slots[slot] = Some(&arg.value);
        }

        for (param, slot) in params.iter().zip(&slots) {
            if slot.is_none() && !param.may_be_unbound() {
                return Err(BuildError::MissingArgument {
                    function: function.to_string(),
                    parameter: param.name.clone(),
                });
            }
        }

        let mut bound = Vec::with_capacity(slots.len());
        for slot in slots {
            bound.push(match slot {
                Some(raw) => Some(self.expr(raw)?),
                None => None,
            });
        }

        Ok(self.arena.alloc(Expr::Call {
            function: function.to_string(),
            args: bound,
        }))
    }
}
