//! Function framework.
//!
//! A [`Function`] is a descriptor plus a body. The descriptor is consulted
//! when rules are built (names, parameter types, optionality) and when they
//! run (defaults, transforms, purity); the body pulls its arguments lazily
//! through [`FunctionArgs`].

mod args;
mod descriptor;
mod registry;

pub use args::{ArgSource, FunctionArgs, ValueArgs};
pub use descriptor::{
    DefaultFn, FunctionDescriptor, FunctionDescriptorBuilder, ParameterDescriptor, TransformFn,
};
pub use registry::FunctionRegistry;

use conduit_core::Value;
use tracing::trace;

use crate::context::EvaluationContext;
use crate::error::EvalError;

pub trait Function: Send + Sync {
    fn descriptor(&self) -> &FunctionDescriptor;

    fn evaluate(
        &self,
        args: &mut FunctionArgs<'_>,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Value, EvalError>;
}

/// Signature of a stateless function body.
pub type NativeBody =
    fn(&mut FunctionArgs<'_>, &mut EvaluationContext<'_>) -> Result<Value, EvalError>;

/// A function whose body is a plain `fn` and needs no state of its own.
pub struct NativeFunction {
    descriptor: FunctionDescriptor,
    body: NativeBody,
}

impl NativeFunction {
    pub fn new(descriptor: FunctionDescriptor, body: NativeBody) -> Self {
        NativeFunction { descriptor, body }
    }
}

impl Function for NativeFunction {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &self,
        args: &mut FunctionArgs<'_>,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Value, EvalError> {
        (self.body)(args, ctx)
    }
}

/// Call a function. Pure functions are answered from the context's memo
/// cache when a recorded call resolved the same arguments to identical
/// values. Matching resolves only arguments the body itself would have
/// asked for, so memoization never evaluates an argument the body skips.
pub fn invoke(
    function: &dyn Function,
    source: &dyn ArgSource,
    precomputed: &[Option<Value>],
    ctx: &mut EvaluationContext<'_>,
) -> Result<Value, EvalError> {
    let descriptor = function.descriptor();
    let mut args = FunctionArgs::new(descriptor, source, precomputed);
    if !(descriptor.is_pure() && ctx.memoizes()) {
        return function.evaluate(&mut args, ctx);
    }
    if let Some(entries) = ctx.memo_entries(descriptor.name()) {
        for entry in entries.iter() {
            if args.replay(&entry.resolved, ctx)? {
                trace!(function = descriptor.name(), "memoized result");
                ctx.memo_hit();
                return Ok(entry.result.clone());
            }
        }
    }
    let result = function.evaluate(&mut args, ctx)?;
    ctx.memo_insert(descriptor.name(), args.resolved_in_order(), result.clone());
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use conduit_core::ValueType;
    use time::macros::datetime;

    use crate::message::Message;

    /// Returns `a`, followed by `b` only when `a` starts with `+`.
    struct Join {
        descriptor: FunctionDescriptor,
        calls: AtomicUsize,
    }

    impl Join {
        fn new(pure: bool) -> Self {
            let builder = FunctionDescriptor::builder("join")
                .returns(ValueType::String)
                .param(ParameterDescriptor::string("a"))
                .param(ParameterDescriptor::long("b").optional());
            let builder = if pure { builder.pure() } else { builder };
            Join {
                descriptor: builder.build(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Function for Join {
        fn descriptor(&self) -> &FunctionDescriptor {
            &self.descriptor
        }

        fn evaluate(
            &self,
            args: &mut FunctionArgs<'_>,
            ctx: &mut EvaluationContext<'_>,
        ) -> Result<Value, EvalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let a = args.required_string("a", ctx)?;
            if !a.starts_with('+') {
                return Ok(Value::from(a));
            }
            let b = args.optional_long("b", ctx)?.unwrap_or(0);
            Ok(Value::from(format!("{a}{b}")))
        }
    }

    /// Bound arguments that count how often each position is evaluated.
    struct Bound {
        values: Vec<Result<Value, EvalError>>,
        evaluations: Vec<Cell<usize>>,
    }

    impl Bound {
        fn new(values: Vec<Result<Value, EvalError>>) -> Self {
            let evaluations = values.iter().map(|_| Cell::new(0)).collect();
            Bound {
                values,
                evaluations,
            }
        }

        fn evaluations(&self) -> Vec<usize> {
            self.evaluations.iter().map(Cell::get).collect()
        }
    }

    impl ArgSource for Bound {
        fn evaluate(
            &self,
            position: usize,
            _ctx: &mut EvaluationContext<'_>,
        ) -> Option<Result<Value, EvalError>> {
            let counter = self.evaluations.get(position)?;
            counter.set(counter.get() + 1);
            self.values.get(position).cloned()
        }
    }

    fn message() -> Message {
        Message::new("m", "test", datetime!(2025-01-01 00:00:00 UTC))
    }

    fn failing() -> Result<Value, EvalError> {
        Err(EvalError::function("boom", "never needed"))
    }

    #[test]
    fn repeated_pure_calls_hit_the_memo() {
        let join = Join::new(true);
        let source = Bound::new(vec![Ok(Value::from("x")), Ok(Value::Long(1))]);
        let mut m = message();
        let mut ctx = EvaluationContext::new(&mut m);

        assert_eq!(invoke(&join, &source, &[], &mut ctx), Ok(Value::from("x")));
        assert_eq!(invoke(&join, &source, &[], &mut ctx), Ok(Value::from("x")));
        assert_eq!(join.calls(), 1);
        assert_eq!(ctx.memo_hits(), 1);
        assert_eq!(source.evaluations(), vec![2, 0]);
    }

    #[test]
    fn memoization_leaves_unused_arguments_unevaluated() {
        let join = Join::new(true);
        let source = Bound::new(vec![Ok(Value::from("x")), failing()]);
        let mut m = message();
        let mut ctx = EvaluationContext::new(&mut m);

        for _ in 0..3 {
            assert_eq!(invoke(&join, &source, &[], &mut ctx), Ok(Value::from("x")));
        }
        assert_eq!(source.evaluations()[1], 0);
        assert_eq!(ctx.memo_hits(), 2);
    }

    #[test]
    fn arguments_read_by_the_body_take_part_in_matching() {
        let join = Join::new(true);
        let one = Bound::new(vec![Ok(Value::from("+")), Ok(Value::Long(1))]);
        let two = Bound::new(vec![Ok(Value::from("+")), Ok(Value::Long(2))]);
        let mut m = message();
        let mut ctx = EvaluationContext::new(&mut m);

        assert_eq!(invoke(&join, &one, &[], &mut ctx), Ok(Value::from("+1")));
        assert_eq!(invoke(&join, &two, &[], &mut ctx), Ok(Value::from("+2")));
        assert_eq!(invoke(&join, &one, &[], &mut ctx), Ok(Value::from("+1")));
        assert_eq!(join.calls(), 2);
        assert_eq!(ctx.memo_hits(), 1);
        // each argument is still evaluated once per call
        assert_eq!(two.evaluations(), vec![1, 1]);
    }

    #[test]
    fn argument_failures_surface_during_matching() {
        let join = Join::new(true);
        let ok = Bound::new(vec![Ok(Value::from("x")), failing()]);
        let broken = Bound::new(vec![failing(), Ok(Value::Long(1))]);
        let mut m = message();
        let mut ctx = EvaluationContext::new(&mut m);

        invoke(&join, &ok, &[], &mut ctx).unwrap();
        assert!(matches!(
            invoke(&join, &broken, &[], &mut ctx),
            Err(EvalError::PrecomputeFailure { .. })
        ));
        assert_eq!(join.calls(), 1);
    }

    #[test]
    fn impure_functions_are_never_memoized() {
        let join = Join::new(false);
        let source = Bound::new(vec![Ok(Value::from("x")), Ok(Value::Long(1))]);
        let mut m = message();
        let mut ctx = EvaluationContext::new(&mut m);

        invoke(&join, &source, &[], &mut ctx).unwrap();
        invoke(&join, &source, &[], &mut ctx).unwrap();
        assert_eq!(join.calls(), 2);
        assert_eq!(ctx.memo_hits(), 0);
        assert!(ctx.memo_entries("join").is_none());
    }

    #[test]
    fn results_agree_with_memoization_disabled() {
        let calls = [
            vec![Ok(Value::from("x")), failing()],
            vec![Ok(Value::from("+")), Ok(Value::Long(3))],
            vec![Ok(Value::from("+")), Ok(Value::Null)],
            vec![Ok(Value::Null), Ok(Value::Long(3))],
            vec![Ok(Value::from("x")), failing()],
            vec![Ok(Value::from("+")), Ok(Value::Long(3))],
        ];
        let join = Join::new(true);
        let mut memo_message = message();
        let mut plain_message = message();
        let mut memoized = EvaluationContext::new(&mut memo_message);
        let mut plain = EvaluationContext::without_memoization(&mut plain_message);

        for values in calls {
            let source = Bound::new(values);
            let a = invoke(&join, &source, &[], &mut memoized);
            let b = invoke(&join, &source, &[], &mut plain);
            assert_eq!(a, b);
        }
        assert_eq!(memoized.memo_hits(), 2);
    }
}
