//! List functions. An absent list propagates as absent unless the
//! function has an obvious answer for it (`list_contains` is false,
//! `list_is_empty` is true).

use conduit_core::{Value, ValueType};

use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::function::{
    FunctionArgs, FunctionDescriptor, FunctionRegistry, NativeFunction, ParameterDescriptor,
};

fn list_fn(name: &str, returns: ValueType, extra: Vec<ParameterDescriptor>) -> FunctionDescriptor {
    let mut builder = FunctionDescriptor::builder(name)
        .returns(returns)
        .pure()
        .param(ParameterDescriptor::list("list"));
    for param in extra {
        builder = builder.param(param);
    }
    builder.build()
}

pub fn register(registry: &mut FunctionRegistry) {
    let element = || ParameterDescriptor::any("element");
    registry.register(NativeFunction::new(
        list_fn("list_add", ValueType::List, vec![element()]),
        list_add,
    ));
    registry.register(NativeFunction::new(
        list_fn("list_contains", ValueType::Boolean, vec![element()]),
        list_contains,
    ));
    registry.register(NativeFunction::new(
        list_fn("list_index_of", ValueType::Long, vec![element()]),
        list_index_of,
    ));
    registry.register(NativeFunction::new(
        list_fn("list_is_empty", ValueType::Boolean, vec![]),
        list_is_empty,
    ));
    registry.register(NativeFunction::new(
        list_fn(
            "list_remove_at",
            ValueType::List,
            vec![ParameterDescriptor::long("index")],
        ),
        list_remove_at,
    ));
    registry.register(NativeFunction::new(
        list_fn(
            "list_retain_all",
            ValueType::List,
            vec![ParameterDescriptor::list("elements")],
        ),
        list_retain_all,
    ));
    registry.register(NativeFunction::new(
        list_fn("list_reverse", ValueType::List, vec![]),
        list_reverse,
    ));
    registry.register(NativeFunction::new(
        list_fn(
            "sub_list",
            ValueType::List,
            vec![
                ParameterDescriptor::long("from"),
                ParameterDescriptor::long("to"),
            ],
        ),
        sub_list,
    ));
}

fn list_arg(
    args: &mut FunctionArgs<'_>,
    ctx: &mut EvaluationContext<'_>,
    name: &str,
) -> Result<Option<Vec<Value>>, EvalError> {
    match args.optional(name, ctx)? {
        Some(Value::List(items)) => Ok(Some(items)),
        _ => Ok(None),
    }
}

fn list_add(args: &mut FunctionArgs<'_>, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvalError> {
    let Some(mut list) = list_arg(args, ctx, "list")? else {
        return Ok(Value::Null);
    };
    if let Some(element) = args.optional("element", ctx)? {
        list.push(element);
    }
    Ok(Value::List(list))
}

fn list_contains(
    args: &mut FunctionArgs<'_>,
    ctx: &mut EvaluationContext<'_>,
) -> Result<Value, EvalError> {
    let list = list_arg(args, ctx, "list")?;
    let element = args.resolve("element", ctx)?;
    Ok(Value::Bool(list.is_some_and(|l| l.contains(&element))))
}

fn list_index_of(
    args: &mut FunctionArgs<'_>,
    ctx: &mut EvaluationContext<'_>,
) -> Result<Value, EvalError> {
    let Some(list) = list_arg(args, ctx, "list")? else {
        return Ok(Value::Null);
    };
    let element = args.resolve("element", ctx)?;
    let index = list.iter().position(|v| *v == element).map_or(-1, |i| i as i64);
    Ok(Value::Long(index))
}

fn list_is_empty(
    args: &mut FunctionArgs<'_>,
    ctx: &mut EvaluationContext<'_>,
) -> Result<Value, EvalError> {
    let list = list_arg(args, ctx, "list")?;
    Ok(Value::Bool(list.map_or(true, |l| l.is_empty())))
}

fn list_remove_at(
    args: &mut FunctionArgs<'_>,
    ctx: &mut EvaluationContext<'_>,
) -> Result<Value, EvalError> {
    let Some(mut list) = list_arg(args, ctx, "list")? else {
        return Ok(Value::Null);
    };
    let Some(index) = args.optional_long("index", ctx)? else {
        return Ok(Value::Null);
    };
    if let Ok(index) = usize::try_from(index) {
        if index < list.len() {
            list.remove(index);
        }
    }
    Ok(Value::List(list))
}

fn list_retain_all(
    args: &mut FunctionArgs<'_>,
    ctx: &mut EvaluationContext<'_>,
) -> Result<Value, EvalError> {
    let Some(list) = list_arg(args, ctx, "list")? else {
        return Ok(Value::Null);
    };
    let keep = list_arg(args, ctx, "elements")?.unwrap_or_default();
    let retained = list
        .into_iter()
        .filter(|v| !v.is_null() && keep.contains(v))
        .collect();
    Ok(Value::List(retained))
}

fn list_reverse(
    args: &mut FunctionArgs<'_>,
    ctx: &mut EvaluationContext<'_>,
) -> Result<Value, EvalError> {
    Ok(match list_arg(args, ctx, "list")? {
        Some(mut list) => {
            list.reverse();
            Value::List(list)
        }
        None => Value::Null,
    })
}

/// Elements `from..to`. An out-of-range or inverted range returns the list
/// unchanged.
fn sub_list(args: &mut FunctionArgs<'_>, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvalError> {
    let Some(list) = list_arg(args, ctx, "list")? else {
        return Ok(Value::Null);
    };
    let from = args.optional_long("from", ctx)?;
    let to = args.optional_long("to", ctx)?;
    let (Some(from), Some(to)) = (from, to) else {
        return Ok(Value::List(list));
    };
    let len = list.len() as i64;
    if from < 0 || to < from || from >= len || to > len {
        return Ok(Value::List(list));
    }
    Ok(Value::List(list[from as usize..to as usize].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::testing::call;

    fn list(items: &[i64]) -> Option<Value> {
        Some(Value::List(items.iter().map(|i| Value::Long(*i)).collect()))
    }

    fn long(l: i64) -> Option<Value> {
        Some(Value::Long(l))
    }

    #[test]
    fn add_appends_and_absent_propagates() {
        assert_eq!(call("list_add", vec![list(&[1]), long(2)]), Ok(list(&[1, 2]).unwrap()));
        assert_eq!(call("list_add", vec![Some(Value::Null), long(2)]), Ok(Value::Null));
    }

    #[test]
    fn membership() {
        assert_eq!(call("list_contains", vec![list(&[1, 2]), long(2)]), Ok(Value::Bool(true)));
        assert_eq!(call("list_contains", vec![None, long(2)]), Ok(Value::Bool(false)));
        assert_eq!(call("list_index_of", vec![list(&[5, 6]), long(6)]), Ok(Value::Long(1)));
        assert_eq!(call("list_index_of", vec![list(&[5, 6]), long(7)]), Ok(Value::Long(-1)));
        assert_eq!(call("list_is_empty", vec![list(&[])]), Ok(Value::Bool(true)));
        assert_eq!(call("list_is_empty", vec![None]), Ok(Value::Bool(true)));
    }

    #[test]
    fn remove_retain_reverse() {
        assert_eq!(call("list_remove_at", vec![list(&[1, 2, 3]), long(1)]), Ok(list(&[1, 3]).unwrap()));
        assert_eq!(call("list_remove_at", vec![list(&[1]), long(5)]), Ok(list(&[1]).unwrap()));
        assert_eq!(
            call("list_retain_all", vec![list(&[1, 2, 3, 2]), list(&[2, 3])]),
            Ok(list(&[2, 3, 2]).unwrap())
        );
        assert_eq!(call("list_retain_all", vec![list(&[1]), None]), Ok(list(&[]).unwrap()));
        assert_eq!(call("list_reverse", vec![list(&[1, 2])]), Ok(list(&[2, 1]).unwrap()));
    }

    #[test]
    fn sub_list_ranges() {
        let l = list(&[0, 1, 2, 3]);
        assert_eq!(call("sub_list", vec![l.clone(), long(1), long(3)]), Ok(list(&[1, 2]).unwrap()));
        assert_eq!(call("sub_list", vec![l.clone(), long(3), long(1)]), Ok(l.clone().unwrap()));
        assert_eq!(call("sub_list", vec![l.clone(), long(0), long(9)]), Ok(l.unwrap()));
    }
}
