//! Operator semantics shared by the interpreter and the compiled form.
//!
//! Both execution paths call into these functions, so they cannot drift
//! apart. Absent (`Value::Null`) operands propagate: an arithmetic,
//! comparison, unary, member or index operation with an absent input
//! yields absent.

use std::cmp::Ordering;

use crate::ast::{ArithOp, CompareOp, UnaryOp};
use crate::value::{Value, ValueType};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OpError {
    #[error("integer division by zero")]
    DivisionByZero,
    #[error("operator '{op}' is not defined for {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("operator '{op}' is not defined for {found}")]
    UnaryMismatch { op: &'static str, found: &'static str },
    #[error("expected a Boolean, got {found}")]
    NotBoolean { found: &'static str },
    #[error("cannot compare {left} with {right}")]
    Incomparable {
        left: &'static str,
        right: &'static str,
    },
    #[error("cannot access member '{name}' of {found}")]
    Member { name: String, found: &'static str },
    #[error("cannot index {target} with {index}")]
    Index {
        target: &'static str,
        index: &'static str,
    },
}

// ──────────────────────────────────────────────
// Arithmetic
// ──────────────────────────────────────────────

/// Binary arithmetic. Two longs stay long and wrap on overflow; any double
/// operand promotes the other side. Integer division and remainder by zero
/// fail, doubles follow IEEE-754.
pub fn arith(op: ArithOp, left: &Value, right: &Value) -> Result<Value, OpError> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Long(a), Value::Long(b)) => long_arith(op, *a, *b).map(Value::Long),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => Ok(Value::Double(double_arith(op, a, b))),
            _ => Err(OpError::TypeMismatch {
                op: op.symbol(),
                left: left.type_name(),
                right: right.type_name(),
            }),
        },
    }
}

/// Arithmetic on a node whose static result type is already known. A
/// `Long` node only ever sees long operands; anything else takes the
/// double path.
pub fn arith_typed(
    op: ArithOp,
    result: ValueType,
    left: &Value,
    right: &Value,
) -> Result<Value, OpError> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    if result == ValueType::Long {
        if let (Value::Long(a), Value::Long(b)) = (left, right) {
            return long_arith(op, *a, *b).map(Value::Long);
        }
    } else if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
        return Ok(Value::Double(double_arith(op, a, b)));
    }
    Err(OpError::TypeMismatch {
        op: op.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    })
}

fn long_arith(op: ArithOp, a: i64, b: i64) -> Result<i64, OpError> {
    Ok(match op {
        ArithOp::Add => a.wrapping_add(b),
        ArithOp::Sub => a.wrapping_sub(b),
        ArithOp::Mul => a.wrapping_mul(b),
        ArithOp::Div => {
            if b == 0 {
                return Err(OpError::DivisionByZero);
            }
            a.wrapping_div(b)
        }
        ArithOp::Mod => {
            if b == 0 {
                return Err(OpError::DivisionByZero);
            }
            a.wrapping_rem(b)
        }
    })
}

fn double_arith(op: ArithOp, a: f64, b: f64) -> f64 {
    match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
        ArithOp::Mod => a % b,
    }
}

pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, OpError> {
    match (op, operand) {
        (_, Value::Null) => Ok(Value::Null),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Negate, Value::Long(l)) => Ok(Value::Long(l.wrapping_neg())),
        (UnaryOp::Negate, Value::Double(d)) => Ok(Value::Double(-d)),
        (UnaryOp::Plus, Value::Long(_) | Value::Double(_)) => Ok(operand.clone()),
        _ => Err(OpError::UnaryMismatch {
            op: op.symbol(),
            found: operand.type_name(),
        }),
    }
}

// ──────────────────────────────────────────────
// Comparison
// ──────────────────────────────────────────────

/// Comparison. Mixed numeric operands compare as doubles; equality on
/// other values is structural.
pub fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<Value, OpError> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    if op.is_equality() {
        let eq = values_equal(left, right);
        return Ok(Value::Bool(if op == CompareOp::Eq { eq } else { !eq }));
    }
    let ordering = match (left, right) {
        (Value::Long(a), Value::Long(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => {
                return Err(OpError::Incomparable {
                    left: left.type_name(),
                    right: right.type_name(),
                })
            }
        },
    };
    // NaN orders with nothing
    let Some(ordering) = ordering else {
        return Ok(Value::Bool(false));
    };
    Ok(Value::Bool(match op {
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
    }))
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Long(a), Value::Long(b)) => a == b,
        (Value::Long(_), Value::Double(_)) | (Value::Double(_), Value::Long(_)) => {
            left.as_f64() == right.as_f64()
        }
        _ => left == right,
    }
}

/// Widen a long to a double where the static type says `Double`, as for a
/// ternary with one long and one double branch.
pub fn coerce(value: Value, ty: ValueType) -> Value {
    match (value, ty) {
        (Value::Long(l), ValueType::Double) => Value::Double(l as f64),
        (value, _) => value,
    }
}

// ──────────────────────────────────────────────
// Conditions and access
// ──────────────────────────────────────────────

/// Condition truth: absent counts as false, anything other than a Boolean
/// is an error.
pub fn truthy(value: &Value) -> Result<bool, OpError> {
    match value {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(*b),
        other => Err(OpError::NotBoolean {
            found: other.type_name(),
        }),
    }
}

/// `target.name`. Missing keys and members are absent.
pub fn member(target: &Value, name: &str) -> Result<Value, OpError> {
    match target {
        Value::Null => Ok(Value::Null),
        Value::Map(entries) => Ok(entries.get(name).cloned().unwrap_or(Value::Null)),
        Value::Object(object) => Ok(object.member(name).unwrap_or(Value::Null)),
        other => Err(OpError::Member {
            name: name.to_string(),
            found: other.type_name(),
        }),
    }
}

/// `target[index]`. Out-of-range positions and missing keys are absent.
pub fn index(target: &Value, index: &Value) -> Result<Value, OpError> {
    match (target, index) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::List(items), Value::Long(i)) => Ok(usize::try_from(*i)
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .unwrap_or(Value::Null)),
        (Value::Map(entries), Value::String(key)) => {
            Ok(entries.get(key).cloned().unwrap_or(Value::Null))
        }
        (Value::Object(object), key) => Ok(object.index(key).unwrap_or(Value::Null)),
        _ => Err(OpError::Index {
            target: target.type_name(),
            index: index.type_name(),
        }),
    }
}
