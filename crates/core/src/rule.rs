//! Built rules.
//!
//! [`Rule::build`] takes a raw rule through lowering, type resolution and
//! constant folding. A rule that comes out of it is well typed; every
//! failure is a [`BuildError`] and the rule never reaches evaluation.

use crate::ast::{Expr, ExprArena, ExprId, Statement};
use crate::error::BuildError;
use crate::fold::fold_constants;
use crate::lower::Lowering;
use crate::signature::FunctionTable;
use crate::syntax::RuleAst;
use crate::typecheck::{Resolver, TypeTable};
use crate::value::ValueType;

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    id: String,
    name: String,
    arena: ExprArena,
    types: TypeTable,
    when: ExprId,
    then: Vec<Statement>,
}

impl Rule {
    pub fn build(
        id: impl Into<String>,
        ast: &RuleAst,
        functions: &dyn FunctionTable,
    ) -> Result<Rule, BuildError> {
        let mut lowering = Lowering::new(functions);
        let when = lowering.expr(&ast.when)?;
        let then = ast
            .then
            .iter()
            .map(|stmt| lowering.statement(stmt))
            .collect::<Result<Vec<_>, _>>()?;
        let mut arena = lowering.arena;

        let mut resolver = Resolver::new(&arena, functions);
        resolver.when(when)?;
        for stmt in &then {
            resolver.statement(stmt)?;
        }
        let types = resolver.finish();

        fold_constants(&mut arena, &types);

        Ok(Rule {
            id: id.into(),
            name: ast.name.clone(),
            arena,
            types,
            when,
            then,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arena(&self) -> &ExprArena {
        &self.arena
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        self.arena.get(id)
    }

    /// Static type of a node, as resolved when the rule was built.
    pub fn type_of(&self, id: ExprId) -> ValueType {
        self.types.get(id)
    }

    pub fn when(&self) -> ExprId {
        self.when
    }

    pub fn then(&self) -> &[Statement] {
        &self.then
    }

    /// Ids of every call node reachable from the rule, in evaluation order.
    pub fn calls(&self) -> Vec<ExprId> {
        let mut out = Vec::new();
        let mut roots = vec![self.when];
        for stmt in &self.then {
            roots.push(match stmt {
                Statement::Let { value, .. } => *value,
                Statement::Call(call) => *call,
            });
        }
        for root in roots {
            self.collect_calls(root, &mut out);
        }
        out
    }

    fn collect_calls(&self, id: ExprId, out: &mut Vec<ExprId>) {
        let expr = self.arena.get(id);
        for child in expr.children() {
            self.collect_calls(child, out);
        }
        if matches!(expr, Expr::Call { .. }) {
            out.push(id);
        }
    }
}
