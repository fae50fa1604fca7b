use conduit_core::{BuildError, OpError, ValueType};
use conduit_storage::StorageError;

/// Errors raised while evaluating a rule against a message.
///
/// These never escape the engine: a failing rule is logged, reported to the
/// listener and treated as "did not match".
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// An operator failed on the values it was given.
    #[error("in `{expr}`: {source}")]
    Operator {
        expr: String,
        #[source]
        source: OpError,
    },
    /// A bound argument failed to evaluate or transform.
    #[error("argument '{argument}' of {function} could not be computed: {source}")]
    PrecomputeFailure {
        function: String,
        argument: String,
        #[source]
        source: Box<EvalError>,
    },
    /// A required argument resolved to absent.
    #[error("required argument '{argument}' of {function} is absent")]
    MissingArgument { function: String, argument: String },
    /// A dynamically typed argument has the wrong runtime type.
    #[error("argument '{argument}' of {function} expects {expected}, got {found}")]
    ArgumentType {
        function: String,
        argument: String,
        expected: ValueType,
        found: &'static str,
    },
    #[error("unbound variable '{name}'")]
    UnboundVariable { name: String },
    /// A function body failed.
    #[error("{function}: {message}")]
    Function { function: String, message: String },
    /// A message handle that does not belong to the current evaluation.
    #[error("message handle {index} does not refer to a message of this evaluation")]
    InvalidMessageHandle { index: usize },
}

impl EvalError {
    pub fn function(function: &str, message: impl Into<String>) -> Self {
        EvalError::Function {
            function: function.to_string(),
            message: message.into(),
        }
    }
}

/// A node shape the closure compiler does not translate. Never surfaces
/// from evaluation; the rule stays on the interpreter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("{node} expressions are not supported by the compiler")]
    Unsupported { node: &'static str },
}

/// Failure to prepare a built rule for evaluation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PrepareError {
    #[error("function '{name}' is not registered")]
    UnknownFunction { name: String },
    #[error("constant argument '{argument}' of {function} is invalid: {message}")]
    ConstantArgument {
        function: String,
        argument: String,
        message: String,
    },
}

/// A definition that could not be loaded. Collected into a
/// [`crate::engine::LoadReport`]; the rest of the definitions still load.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadProblem {
    #[error("rule {id} could not be parsed: {message}")]
    Parse { id: String, message: String },
    #[error("rule {id} could not be built: {source}")]
    Build {
        id: String,
        #[source]
        source: BuildError,
    },
    #[error("rule {id} could not be prepared: {source}")]
    Prepare {
        id: String,
        #[source]
        source: PrepareError,
    },
    #[error("rule {id} is named '{name}', which rule {existing} already uses")]
    DuplicateRuleName {
        id: String,
        name: String,
        existing: String,
    },
    #[error("pipeline {pipeline} stage {stage} references unknown rule '{rule}'")]
    UnknownRule {
        pipeline: String,
        stage: i32,
        rule: String,
    },
    #[error("pipeline {pipeline} could not be built: {source}")]
    Pipeline {
        pipeline: String,
        #[source]
        source: BuildError,
    },
}

/// Errors from engine-level operations (definition loading, connection
/// resolution).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}
