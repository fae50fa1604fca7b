//! Type conversion functions. Unconvertible input yields the default
//! rather than an error.

use std::collections::BTreeMap;

use conduit_core::{Value, ValueType};

use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::function::{
    FunctionArgs, FunctionDescriptor, FunctionRegistry, NativeFunction, ParameterDescriptor,
};

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(NativeFunction::new(
        FunctionDescriptor::builder("to_long")
            .returns(ValueType::Long)
            .pure()
            .param(ParameterDescriptor::any("value"))
            .param(ParameterDescriptor::long("default").default_value(|| Value::Long(0)))
            .description("Converts a value to a long, or returns the default")
            .build(),
        to_long,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::builder("to_double")
            .returns(ValueType::Double)
            .pure()
            .param(ParameterDescriptor::any("value"))
            .param(ParameterDescriptor::double("default").default_value(|| Value::Double(0.0)))
            .description("Converts a value to a double, or returns the default")
            .build(),
        to_double,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::builder("to_bool")
            .returns(ValueType::Boolean)
            .pure()
            .param(ParameterDescriptor::any("value"))
            .build(),
        to_bool,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::builder("to_string")
            .returns(ValueType::String)
            .pure()
            .param(ParameterDescriptor::any("value"))
            .param(ParameterDescriptor::string("default").default_value(|| Value::from("")))
            .build(),
        to_string,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::builder("to_map")
            .returns(ValueType::Map)
            .pure()
            .param(ParameterDescriptor::any("value"))
            .build(),
        to_map,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::builder("is_null")
            .returns(ValueType::Boolean)
            .pure()
            .param(ParameterDescriptor::any("value"))
            .build(),
        is_null,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::builder("is_not_null")
            .returns(ValueType::Boolean)
            .pure()
            .param(ParameterDescriptor::any("value"))
            .build(),
        is_not_null,
    ));
}

fn to_long(args: &mut FunctionArgs<'_>, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvalError> {
    let value = args.resolve("value", ctx)?;
    let converted = match &value {
        Value::Long(l) => Some(*l),
        Value::Double(d) if d.is_finite() => Some(*d as i64),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match converted {
        Some(l) => Ok(Value::Long(l)),
        None => args.resolve("default", ctx),
    }
}

fn to_double(
    args: &mut FunctionArgs<'_>,
    ctx: &mut EvaluationContext<'_>,
) -> Result<Value, EvalError> {
    let value = args.resolve("value", ctx)?;
    let converted = match &value {
        Value::Long(_) | Value::Double(_) => value.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match converted {
        Some(d) => Ok(Value::Double(d)),
        None => args.resolve("default", ctx),
    }
}

fn to_bool(args: &mut FunctionArgs<'_>, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvalError> {
    let b = match args.resolve("value", ctx)? {
        Value::Bool(b) => b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        Value::Long(l) => l != 0,
        Value::Double(d) => d != 0.0,
        _ => false,
    };
    Ok(Value::Bool(b))
}

fn to_string(
    args: &mut FunctionArgs<'_>,
    ctx: &mut EvaluationContext<'_>,
) -> Result<Value, EvalError> {
    match args.resolve("value", ctx)? {
        Value::Null => args.resolve("default", ctx),
        Value::String(s) => Ok(Value::String(s)),
        other => Ok(Value::String(other.to_string())),
    }
}

fn to_map(args: &mut FunctionArgs<'_>, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvalError> {
    match args.resolve("value", ctx)? {
        Value::Map(map) => Ok(Value::Map(map)),
        _ => Ok(Value::Map(BTreeMap::new())),
    }
}

fn is_null(args: &mut FunctionArgs<'_>, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvalError> {
    Ok(Value::Bool(args.resolve("value", ctx)?.is_null()))
}

fn is_not_null(
    args: &mut FunctionArgs<'_>,
    ctx: &mut EvaluationContext<'_>,
) -> Result<Value, EvalError> {
    Ok(Value::Bool(!args.resolve("value", ctx)?.is_null()))
}
