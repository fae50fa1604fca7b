use crate::ast::ExprId;
use crate::value::ValueType;

/// A static type violation, found once while building a rule.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("type error in `{snippet}`: {kind}")]
pub struct TypeError {
    /// The offending node.
    pub expr: ExprId,
    /// The offending subexpression rendered as source text.
    pub snippet: String,
    pub kind: TypeErrorKind,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeErrorKind {
    #[error("operator '{op}' needs numeric operands, got {left} and {right}")]
    Arithmetic {
        op: &'static str,
        left: ValueType,
        right: ValueType,
    },
    #[error("operator '{op}' cannot compare {left} with {right}")]
    Comparison {
        op: &'static str,
        left: ValueType,
        right: ValueType,
    },
    #[error("operator '{op}' needs a Boolean operand, got {found}")]
    Logical { op: &'static str, found: ValueType },
    #[error("unary '{op}' is not defined for {found}")]
    Unary { op: &'static str, found: ValueType },
    #[error("ternary condition must be Boolean, got {found}")]
    Condition { found: ValueType },
    #[error("cannot access members of {found}")]
    Member { found: ValueType },
    #[error("cannot index {target} with {index}")]
    Index { target: ValueType, index: ValueType },
    #[error("argument '{parameter}' of {function} expects {expected}, got {found}")]
    Argument {
        function: String,
        parameter: String,
        expected: ValueType,
        found: ValueType,
    },
    #[error("{function} returns nothing and cannot be used as a value")]
    VoidValue { function: String },
    #[error("unknown variable '{name}'")]
    UnknownVariable { name: String },
    #[error("'when' must be Boolean, got {found}")]
    When { found: ValueType },
}

/// Errors that make a single rule or pipeline unbuildable.
///
/// These are reported to the definition owner; the affected rule is
/// excluded from evaluation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },
    #[error("{function} has no parameter named '{parameter}'")]
    UnknownParameter { function: String, parameter: String },
    #[error("parameter '{parameter}' of {function} is bound twice")]
    DuplicateArgument { function: String, parameter: String },
    #[error("{function} takes {expected} arguments, got {found}")]
    TooManyArguments {
        function: String,
        expected: usize,
        found: usize,
    },
    #[error("positional argument after named argument in call to {function}")]
    PositionalAfterNamed { function: String },
    #[error("missing required argument '{parameter}' of {function}")]
    MissingArgument { function: String, parameter: String },
    #[error("pipeline '{pipeline}' declares stage {stage} more than once")]
    DuplicateStage { pipeline: String, stage: i32 },
    #[error(transparent)]
    Type(#[from] TypeError),
}
