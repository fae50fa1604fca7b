//! conduit-eval: runs Conduit rules against messages.
//!
//! Rules are built by `conduit-core`; this crate supplies what they need at
//! run time:
//!
//! - [`function`] -- the function framework and [`FunctionRegistry`]
//! - [`functions`] -- the built-in function library
//! - [`Interpreter`] -- tree-walking evaluation of a prepared rule
//! - [`compiler`] -- closure compilation, with interpreter fallback
//! - [`PipelineEngine`] -- stage-by-stage pipeline execution over a hot
//!   swappable snapshot of definitions
//!
//! Definitions come from `conduit-storage`; rule sources are turned into
//! syntax trees by a [`RuleParser`].

pub mod compiler;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod function;
pub mod functions;
pub mod interpreter;
pub mod listener;
pub mod message;
pub mod parser;
pub mod prepared;
pub mod stream_cache;

// ── Convenience re-exports ───────────────────────────────────────────

pub use compiler::{compile, CompiledRule};
pub use config::{CompilerConfig, ConfigError, EngineConfig};
pub use context::EvaluationContext;
pub use engine::{Applicable, EngineState, LoadReport, PipelineEngine, Simulation};
pub use error::{CompileError, EngineError, EvalError, LoadProblem, PrepareError};
pub use function::{Function, FunctionRegistry, NativeFunction};
pub use interpreter::Interpreter;
pub use listener::{EvaluationEvent, EvaluationListener, NoopListener, RecordingListener};
pub use message::{Message, MessageHandle};
pub use parser::{JsonRuleParser, ParseError, RuleParser};
pub use prepared::PreparedRule;
pub use stream_cache::StreamCache;
