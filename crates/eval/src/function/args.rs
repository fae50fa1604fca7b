//! Lazy argument binding.
//!
//! A function body pulls its arguments by parameter name. Nothing is
//! evaluated until it is asked for, and each argument is evaluated at most
//! once per call.

use conduit_core::{ops, Value, ValueType};

use super::descriptor::FunctionDescriptor;
use crate::context::EvaluationContext;
use crate::error::EvalError;

/// Where bound argument expressions come from: the interpreter walks the
/// rule's arena, the compiled form calls closures.
pub trait ArgSource {
    /// Evaluate the argument bound at `position`, or `None` if the call
    /// left that parameter unbound.
    fn evaluate(
        &self,
        position: usize,
        ctx: &mut EvaluationContext<'_>,
    ) -> Option<Result<Value, EvalError>>;
}

/// Arguments that are already values, for calling functions from host
/// code.
#[derive(Debug, Clone, Default)]
pub struct ValueArgs(pub Vec<Option<Value>>);

impl ArgSource for ValueArgs {
    fn evaluate(
        &self,
        position: usize,
        _ctx: &mut EvaluationContext<'_>,
    ) -> Option<Result<Value, EvalError>> {
        self.0.get(position).cloned().flatten().map(Ok)
    }
}

pub struct FunctionArgs<'a> {
    descriptor: &'a FunctionDescriptor,
    source: &'a dyn ArgSource,
    /// Constant arguments already transformed when the rule was prepared.
    precomputed: &'a [Option<Value>],
    resolved: Vec<Option<Value>>,
    /// Positions in the order they were first resolved.
    order: Vec<usize>,
}

impl<'a> FunctionArgs<'a> {
    pub fn new(
        descriptor: &'a FunctionDescriptor,
        source: &'a dyn ArgSource,
        precomputed: &'a [Option<Value>],
    ) -> Self {
        FunctionArgs {
            descriptor,
            source,
            precomputed,
            resolved: vec![None; descriptor.params().len()],
            order: Vec::new(),
        }
    }

    fn position(&self, name: &str) -> Result<usize, EvalError> {
        self.descriptor.param_index(name).ok_or_else(|| {
            EvalError::function(
                self.descriptor.name(),
                format!("no parameter named '{}'", name),
            )
        })
    }

    fn resolve_at(
        &mut self,
        position: usize,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Value, EvalError> {
        if let Some(value) = &self.resolved[position] {
            return Ok(value.clone());
        }
        let value = match self.precomputed.get(position).cloned().flatten() {
            Some(value) => value,
            None => self.evaluate_at(position, ctx)?,
        };
        self.resolved[position] = Some(value.clone());
        self.order.push(position);
        Ok(value)
    }

    fn evaluate_at(
        &self,
        position: usize,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Value, EvalError> {
        let param = &self.descriptor.params()[position];
        let failure = |source: EvalError| EvalError::PrecomputeFailure {
            function: self.descriptor.name().to_string(),
            argument: param.name().to_string(),
            source: Box::new(source),
        };
        let value = match self.source.evaluate(position, ctx) {
            None => {
                return Ok(param
                    .default_supplier()
                    .map(|supplier| supplier())
                    .unwrap_or(Value::Null))
            }
            Some(result) => result.map_err(failure)?,
        };
        if value.is_null() {
            return Ok(value);
        }
        if !value.conforms_to(param.ty()) {
            return Err(EvalError::ArgumentType {
                function: self.descriptor.name().to_string(),
                argument: param.name().to_string(),
                expected: param.ty(),
                found: value.type_name(),
            });
        }
        let value = ops::coerce(value, param.ty());
        match param.transformer() {
            Some(transform) => transform(value)
                .map_err(|message| failure(EvalError::function(self.descriptor.name(), message))),
            None => Ok(value),
        }
    }

    /// The argument's value, or absent.
    pub fn resolve(
        &mut self,
        name: &str,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Value, EvalError> {
        let position = self.position(name)?;
        self.resolve_at(position, ctx)
    }

    /// Whether these arguments agree with a recorded call. Recorded
    /// positions are resolved in order and matching stops at the first
    /// difference.
    pub(crate) fn replay(
        &mut self,
        recorded: &[(usize, Value)],
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<bool, EvalError> {
        for (position, expected) in recorded {
            if !self.resolve_at(*position, ctx)?.identical(expected) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// The arguments resolved so far, in resolution order.
    pub(crate) fn resolved_in_order(&self) -> Vec<(usize, Value)> {
        self.order
            .iter()
            .filter_map(|&position| {
                self.resolved[position]
                    .clone()
                    .map(|value| (position, value))
            })
            .collect()
    }

    /// The argument's value; absent is a [`EvalError::MissingArgument`].
    pub fn required(
        &mut self,
        name: &str,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Value, EvalError> {
        let value = self.resolve(name, ctx)?;
        if value.is_null() {
            return Err(EvalError::MissingArgument {
                function: self.descriptor.name().to_string(),
                argument: name.to_string(),
            });
        }
        Ok(value)
    }

    /// The argument's value, `None` when absent. Never fails on absence.
    pub fn optional(
        &mut self,
        name: &str,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<Value>, EvalError> {
        let value = self.resolve(name, ctx)?;
        Ok(if value.is_null() { None } else { Some(value) })
    }

    // ── Typed accessors ──────────────────────────────────────────────────

    pub fn required_string(
        &mut self,
        name: &str,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<String, EvalError> {
        let value = self.required(name, ctx)?;
        self.expect_string(name, value)
    }

    pub fn optional_string(
        &mut self,
        name: &str,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<String>, EvalError> {
        self.optional(name, ctx)?
            .map(|v| self.expect_string(name, v))
            .transpose()
    }

    pub fn required_long(
        &mut self,
        name: &str,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<i64, EvalError> {
        let value = self.required(name, ctx)?;
        value
            .as_long()
            .ok_or_else(|| self.mismatch(name, ValueType::Long, &value))
    }

    pub fn optional_long(
        &mut self,
        name: &str,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<i64>, EvalError> {
        self.optional(name, ctx)?
            .map(|v| v.as_long().ok_or_else(|| self.mismatch(name, ValueType::Long, &v)))
            .transpose()
    }

    pub fn optional_bool(
        &mut self,
        name: &str,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Option<bool>, EvalError> {
        self.optional(name, ctx)?
            .map(|v| v.as_bool().ok_or_else(|| self.mismatch(name, ValueType::Boolean, &v)))
            .transpose()
    }

    fn expect_string(&self, name: &str, value: Value) -> Result<String, EvalError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(self.mismatch(name, ValueType::String, &other)),
        }
    }

    fn mismatch(&self, name: &str, expected: ValueType, found: &Value) -> EvalError {
        EvalError::ArgumentType {
            function: self.descriptor.name().to_string(),
            argument: name.to_string(),
            expected,
            found: found.type_name(),
        }
    }
}
