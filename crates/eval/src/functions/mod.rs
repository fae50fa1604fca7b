//! Built-in function library.

pub mod conversion;
pub mod lists;
pub mod lookup;
pub mod messages;
pub mod strings;

use crate::function::FunctionRegistry;

pub use lookup::{InMemoryLookupTables, Lookup, LookupTables};
pub use messages::RouteToStream;
pub use strings::RegexMatch;

/// Register every function that needs no host service.
pub fn register_builtins(registry: &mut FunctionRegistry) {
    conversion::register(registry);
    messages::register(registry);
    strings::register(registry);
    lists::register(registry);
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers for calling functions directly with evaluated arguments.

    use conduit_core::Value;
    use time::macros::datetime;

    use crate::context::EvaluationContext;
    use crate::error::EvalError;
    use crate::function::{invoke, FunctionRegistry, ValueArgs};
    use crate::message::Message;

    pub fn message() -> Message {
        Message::new("hello", "test", datetime!(2025-01-01 00:00:00 UTC))
    }

    pub fn call_in(
        ctx: &mut EvaluationContext<'_>,
        name: &str,
        args: Vec<Option<Value>>,
    ) -> Result<Value, EvalError> {
        let registry = FunctionRegistry::with_builtins();
        let function = registry
            .get(name)
            .unwrap_or_else(|| panic!("no function {name}"))
            .clone();
        invoke(function.as_ref(), &ValueArgs(args), &[], ctx)
    }

    pub fn call(name: &str, args: Vec<Option<Value>>) -> Result<Value, EvalError> {
        let mut m = message();
        let mut ctx = EvaluationContext::new(&mut m);
        call_in(&mut ctx, name, args)
    }
}
