//! Rule building end to end: JSON syntax tree in, typed and folded rule out.

use std::collections::HashMap;

use conduit_core::{
    ops, ArithOp, BuildError, Expr, FunctionSignature, Literal, ParamSignature, Rule, RuleAst,
    Statement, TypeErrorKind, Value, ValueType,
};
use proptest::prelude::*;
use serde_json::json;

// ──────────────────────────────────────────────
// Fixtures
// ──────────────────────────────────────────────

fn functions() -> HashMap<String, FunctionSignature> {
    let mut table = HashMap::new();
    let mut add = |name: &str, return_type: ValueType, params: Vec<ParamSignature>| {
        table.insert(
            name.to_string(),
            FunctionSignature {
                name: name.to_string(),
                return_type,
                params,
                pure: true,
            },
        );
    };
    add(
        "has_field",
        ValueType::Boolean,
        vec![ParamSignature::required("field", ValueType::String)],
    );
    add(
        "to_long",
        ValueType::Long,
        vec![
            ParamSignature::required("value", ValueType::Any),
            ParamSignature {
                has_default: true,
                ..ParamSignature::required("default", ValueType::Long)
            },
        ],
    );
    add(
        "set_field",
        ValueType::Void,
        vec![
            ParamSignature::required("field", ValueType::String),
            ParamSignature::required("value", ValueType::Any),
            ParamSignature::optional("message", ValueType::Object),
        ],
    );
    table
}

fn build(rule: serde_json::Value) -> Result<Rule, BuildError> {
    let ast: RuleAst = serde_json::from_value(rule).unwrap();
    Rule::build("r1", &ast, &functions())
}

fn string(s: &str) -> serde_json::Value {
    json!({"kind": "literal", "value": {"string": s}})
}

fn long(n: i64) -> serde_json::Value {
    json!({"kind": "literal", "value": {"long": n}})
}

// ──────────────────────────────────────────────
// Building
// ──────────────────────────────────────────────

#[test]
fn increment_rule_builds_with_bound_arguments() {
    let rule = build(json!({
        "name": "increment",
        "when": {"kind": "call", "function": "has_field", "args": [{"value": string("field")}]},
        "then": [{
            "kind": "call",
            "function": "set_field",
            "args": [
                {"value": string("field")},
                {"value": {
                    "kind": "arith", "op": "add",
                    "left": {"kind": "call", "function": "to_long", "args": [
                        {"value": {"kind": "field", "name": "field"}}
                    ]},
                    "right": long(1)
                }}
            ]
        }]
    }))
    .unwrap();

    assert_eq!(rule.name(), "increment");
    assert_eq!(rule.type_of(rule.when()), ValueType::Boolean);

    let Statement::Call(call) = &rule.then()[0] else {
        panic!("expected a call statement");
    };
    let Expr::Call { function, args } = rule.expr(*call) else {
        panic!("expected a call expression");
    };
    assert_eq!(function, "set_field");
    assert_eq!(args.len(), 3);
    assert!(args[2].is_none(), "optional message stays unbound");

    let value = args[1].unwrap();
    assert_eq!(rule.type_of(value), ValueType::Long);
}

#[test]
fn named_arguments_bind_by_name() {
    let rule = build(json!({
        "name": "named",
        "when": {"kind": "literal", "value": {"bool": true}},
        "then": [{
            "kind": "call",
            "function": "set_field",
            "args": [
                {"name": "value", "value": long(1)},
                {"name": "field", "value": string("x")}
            ]
        }]
    }))
    .unwrap();
    let Statement::Call(call) = &rule.then()[0] else {
        panic!("expected a call statement");
    };
    let Expr::Call { args, .. } = rule.expr(*call) else {
        panic!("expected a call expression");
    };
    let field = args[0].unwrap();
    assert_eq!(rule.expr(field), &Expr::Literal(Literal::String("x".to_string())));
}

#[test]
fn constant_subtrees_are_folded() {
    let rule = build(json!({
        "name": "folded",
        "when": {
            "kind": "compare", "op": "gt",
            "left": {"kind": "arith", "op": "mul", "left": long(6), "right": long(7)},
            "right": long(40)
        }
    }))
    .unwrap();
    assert_eq!(rule.expr(rule.when()), &Expr::Literal(Literal::Bool(true)));
}

#[test]
fn division_by_zero_is_not_folded() {
    let rule = build(json!({
        "name": "late",
        "when": {
            "kind": "compare", "op": "eq",
            "left": {"kind": "arith", "op": "div", "left": long(1), "right": long(0)},
            "right": long(0)
        }
    }))
    .unwrap();
    assert!(matches!(rule.expr(rule.when()), Expr::Compare { .. }));
}

// ──────────────────────────────────────────────
// Build errors
// ──────────────────────────────────────────────

#[test]
fn arithmetic_on_a_field_needs_a_conversion() {
    let err = build(json!({
        "name": "untyped",
        "when": {
            "kind": "compare", "op": "gt",
            "left": {"kind": "arith", "op": "add", "left": {"kind": "field", "name": "n"}, "right": long(1)},
            "right": long(2)
        }
    }))
    .unwrap_err();
    let BuildError::Type(err) = err else {
        panic!("expected a type error, got {err:?}");
    };
    assert!(matches!(err.kind, TypeErrorKind::Arithmetic { op: "+", .. }));
    assert!(err.snippet.contains("$message.n"), "{}", err.snippet);
}

#[test]
fn unknown_functions_and_parameters_are_rejected() {
    let err = build(json!({
        "name": "unknown",
        "when": {"kind": "call", "function": "nope"}
    }))
    .unwrap_err();
    assert_eq!(err, BuildError::UnknownFunction { name: "nope".to_string() });

    let err = build(json!({
        "name": "bad-name",
        "when": {"kind": "call", "function": "has_field", "args": [
            {"name": "fieldname", "value": string("x")}
        ]}
    }))
    .unwrap_err();
    assert!(matches!(err, BuildError::UnknownParameter { .. }));
}

#[test]
fn missing_required_argument_is_a_build_error() {
    let err = build(json!({
        "name": "missing",
        "when": {"kind": "call", "function": "has_field"}
    }))
    .unwrap_err();
    assert_eq!(
        err,
        BuildError::MissingArgument {
            function: "has_field".to_string(),
            parameter: "field".to_string(),
        }
    );
}

#[test]
fn when_must_be_boolean() {
    let err = build(json!({"name": "long", "when": long(1)})).unwrap_err();
    assert!(matches!(
        err,
        BuildError::Type(ref e) if matches!(e.kind, TypeErrorKind::When { found: ValueType::Long })
    ));
}

// ──────────────────────────────────────────────
// Numeric promotion
// ──────────────────────────────────────────────

const OPS: [ArithOp; 4] = [ArithOp::Add, ArithOp::Sub, ArithOp::Mul, ArithOp::Mod];

proptest! {
    #[test]
    fn long_arithmetic_wraps(a in any::<i64>(), b in any::<i64>(), op in 0usize..4) {
        let expected = match OPS[op] {
            ArithOp::Add => Some(a.wrapping_add(b)),
            ArithOp::Sub => Some(a.wrapping_sub(b)),
            ArithOp::Mul => Some(a.wrapping_mul(b)),
            _ => (b != 0).then(|| a.wrapping_rem(b)),
        };
        let result = ops::arith(OPS[op], &Value::Long(a), &Value::Long(b));
        match expected {
            Some(n) => prop_assert_eq!(result, Ok(Value::Long(n))),
            None => prop_assert!(result.is_err()),
        }
    }

    #[test]
    fn mixed_arithmetic_promotes_to_double(a in -1_000_000i64..1_000_000, b in -1.0e6f64..1.0e6) {
        let sum = ops::arith(ArithOp::Add, &Value::Long(a), &Value::Double(b));
        prop_assert_eq!(sum, Ok(Value::Double(a as f64 + b)));
        let product = ops::arith(ArithOp::Mul, &Value::Double(b), &Value::Long(a));
        prop_assert_eq!(product, Ok(Value::Double(b * a as f64)));
    }

    #[test]
    fn absent_operands_stay_absent(a in any::<i64>(), op in 0usize..4) {
        prop_assert_eq!(ops::arith(OPS[op], &Value::Null, &Value::Long(a)), Ok(Value::Null));
        prop_assert_eq!(ops::arith(OPS[op], &Value::Long(a), &Value::Null), Ok(Value::Null));
    }
}
