//! Arena-allocated expression tree.
//!
//! Nodes live in an [`ExprArena`] and refer to their children by
//! [`ExprId`]. Children are always allocated before their parent, so every
//! child id is smaller than its parent's id and the tree is acyclic by
//! construction. Each node has exactly one parent.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Literal;

// ──────────────────────────────────────────────
// Operators
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Negate => "-",
            UnaryOp::Plus => "+",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    pub fn is_equality(self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::Ne)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn symbol(self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
        }
    }
}

// ──────────────────────────────────────────────
// Nodes
// ──────────────────────────────────────────────

/// Index of a node inside its rule's [`ExprArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        ExprId(index as u32)
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Message,
    Field(String),
    Var(String),
    Unary {
        op: UnaryOp,
        operand: ExprId,
    },
    Arith {
        op: ArithOp,
        left: ExprId,
        right: ExprId,
    },
    Compare {
        op: CompareOp,
        left: ExprId,
        right: ExprId,
    },
    Logical {
        op: LogicalOp,
        left: ExprId,
        right: ExprId,
    },
    Ternary {
        condition: ExprId,
        then: ExprId,
        otherwise: ExprId,
    },
    List(Vec<ExprId>),
    Map(Vec<(String, ExprId)>),
    Member {
        target: ExprId,
        name: String,
    },
    Index {
        target: ExprId,
        index: ExprId,
    },
    /// Function call with arguments bound to parameter positions of the
    /// function's signature; `None` marks an unbound (defaulted) parameter.
    Call {
        function: String,
        args: Vec<Option<ExprId>>,
    },
}

impl Expr {
    /// Short node-kind name, used for tracing and compile diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Literal(_) => "literal",
            Expr::Message => "message",
            Expr::Field(_) => "field",
            Expr::Var(_) => "var",
            Expr::Unary { .. } => "unary",
            Expr::Arith { .. } => "arith",
            Expr::Compare { .. } => "compare",
            Expr::Logical { .. } => "logical",
            Expr::Ternary { .. } => "ternary",
            Expr::List(_) => "list",
            Expr::Map(_) => "map",
            Expr::Member { .. } => "member",
            Expr::Index { .. } => "index",
            Expr::Call { .. } => "call",
        }
    }

    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<ExprId> {
        match self {
            Expr::Literal(_) | Expr::Message | Expr::Field(_) | Expr::Var(_) => Vec::new(),
            Expr::Unary { operand, .. } => vec![*operand],
            Expr::Arith { left, right, .. }
            | Expr::Compare { left, right, .. }
            | Expr::Logical { left, right, .. } => vec![*left, *right],
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => vec![*condition, *then, *otherwise],
            Expr::List(items) => items.clone(),
            Expr::Map(entries) => entries.iter().map(|(_, id)| *id).collect(),
            Expr::Member { target, .. } => vec![*target],
            Expr::Index { target, index } => vec![*target, *index],
            Expr::Call { args, .. } => args.iter().flatten().copied().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Let { name: String, value: ExprId },
    /// A call whose return value is discarded; always points at an `Expr::Call`.
    Call(ExprId),
}

// ──────────────────────────────────────────────
// Arena
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExprArena {
    nodes: Vec<Expr>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node. Children must already be allocated.
    pub fn alloc(&mut self, expr: Expr) -> ExprId {
        debug_assert!(expr.children().iter().all(|c| c.index() < self.nodes.len()));
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(expr);
        id
    }

    pub fn get(&self, id: ExprId) -> &Expr {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Replace a node in place. The replaced node's children become
    /// unreachable; the caller keeps the types side table consistent.
    pub(crate) fn replace(&mut self, id: ExprId, expr: Expr) -> Expr {
        std::mem::replace(&mut self.nodes[id.index()], expr)
    }

    /// A node is constant iff it is a literal or all of its children are
    /// constant. References, member/index access and calls never are.
    pub fn is_constant(&self, id: ExprId) -> bool {
        match self.get(id) {
            Expr::Literal(_) => true,
            Expr::Message
            | Expr::Field(_)
            | Expr::Var(_)
            | Expr::Member { .. }
            | Expr::Index { .. }
            | Expr::Call { .. } => false,
            other => other.children().into_iter().all(|c| self.is_constant(c)),
        }
    }

    /// Render a subtree back to source-like text for diagnostics.
    pub fn render(&self, id: ExprId) -> String {
        let mut out = String::new();
        self.render_into(id, &mut out);
        out
    }

    fn render_into(&self, id: ExprId, out: &mut String) {
        use std::fmt::Write;
        match self.get(id) {
            Expr::Literal(lit) => {
                let _ = write!(out, "{}", lit);
            }
            Expr::Message => out.push_str("$message"),
            Expr::Field(name) => {
                let _ = write!(out, "$message.{}", name);
            }
            Expr::Var(name) => out.push_str(name),
            Expr::Unary { op, operand } => {
                out.push_str(op.symbol());
                self.render_into(*operand, out);
            }
            Expr::Arith { op, left, right } => self.render_binary(*left, op.symbol(), *right, out),
            Expr::Compare { op, left, right } => {
                self.render_binary(*left, op.symbol(), *right, out)
            }
            Expr::Logical { op, left, right } => {
                self.render_binary(*left, op.symbol(), *right, out)
            }
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                self.render_into(*condition, out);
                out.push_str(" ? ");
                self.render_into(*then, out);
                out.push_str(" : ");
                self.render_into(*otherwise, out);
            }
            Expr::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.render_into(*item, out);
                }
                out.push(']');
            }
            Expr::Map(entries) => {
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "{}: ", key);
                    self.render_into(*value, out);
                }
                out.push('}');
            }
            Expr::Member { target, name } => {
                self.render_into(*target, out);
                let _ = write!(out, ".{}", name);
            }
            Expr::Index { target, index } => {
                self.render_into(*target, out);
                out.push('[');
                self.render_into(*index, out);
                out.push(']');
            }
            Expr::Call { function, args } => {
                let _ = write!(out, "{}(", function);
                for (i, arg) in args.iter().flatten().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.render_into(*arg, out);
                }
                out.push(')');
            }
        }
    }

    fn render_binary(&self, left: ExprId, symbol: &str, right: ExprId, out: &mut String) {
        out.push('(');
        self.render_into(left, out);
        out.push(' ');
        out.push_str(symbol);
        out.push(' ');
        self.render_into(right, out);
        out.push(')');
    }
}
