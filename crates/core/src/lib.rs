//! conduit-core: the Conduit rule language.
//!
//! Provides everything needed to turn a rule's syntax tree into a checked,
//! typed rule that an evaluator can run:
//!
//! - [`Value`] and [`ValueType`] -- runtime values and static types
//! - [`RuleAst`] -- the raw tree produced by a front-end parser
//! - [`Rule::build`] -- lowering, argument binding, type resolution and
//!   constant folding
//! - [`ops`] -- operator semantics shared by every execution strategy
//! - [`Pipeline`] and [`Stage`] -- ordered rule groups with match policies

pub mod ast;
pub mod error;
mod fold;
mod lower;
pub mod ops;
pub mod pipeline;
pub mod rule;
pub mod signature;
pub mod syntax;
pub mod typecheck;
pub mod value;

// ── Convenience re-exports ───────────────────────────────────────────

pub use ast::{ArithOp, CompareOp, Expr, ExprArena, ExprId, LogicalOp, Statement, UnaryOp};
pub use error::{BuildError, TypeError, TypeErrorKind};
pub use ops::OpError;
pub use pipeline::{MatchPolicy, Pipeline, Stage};
pub use rule::Rule;
pub use signature::{FunctionSignature, FunctionTable, ParamSignature};
pub use syntax::{RawArg, RawExpr, RawStatement, RuleAst};
pub use typecheck::{promote, BinaryOp, TypeTable};
pub use value::{HostObject, Literal, ObjectRef, Value, ValueType};
