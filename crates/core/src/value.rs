//! Runtime values and static value types.
//!
//! `Value` is the closed set of things an expression can produce. Numbers
//! are either 64-bit integers (`Long`) or IEEE-754 doubles (`Double`);
//! `Null` is the absent value produced by unset fields and unresolved
//! optional arguments. Host-provided objects (compiled patterns, regex
//! results, message handles) travel opaquely as `Value::Object`.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Static types
// ──────────────────────────────────────────────

/// Static type of an expression, resolved once before any evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Dynamically typed (message fields, untyped parameters).
    Any,
    /// Returned by functions that only have side effects.
    Void,
    Long,
    Double,
    Boolean,
    String,
    List,
    Map,
    Object,
}

impl ValueType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Long | ValueType::Double)
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Any => "Any",
            ValueType::Void => "Void",
            ValueType::Long => "Long",
            ValueType::Double => "Double",
            ValueType::Boolean => "Boolean",
            ValueType::String => "String",
            ValueType::List => "List",
            ValueType::Map => "Map",
            ValueType::Object => "Object",
        }
    }

    /// Whether an expression of type `other` may be bound where `self` is
    /// expected. `Any` on either side defers the check to runtime and a
    /// `Long` widens to `Double`.
    pub fn accepts(self, other: ValueType) -> bool {
        self == other
            || self == ValueType::Any
            || other == ValueType::Any
            || (self == ValueType::Double && other == ValueType::Long)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ──────────────────────────────────────────────
// Host objects
// ──────────────────────────────────────────────

/// An object supplied by the host and carried through rules opaquely.
///
/// Implementations may expose members (`value.name`) and indexed access
/// (`value["key"]`); both default to "not present".
pub trait HostObject: fmt::Debug + Send + Sync + 'static {
    fn type_name(&self) -> &'static str;

    fn member(&self, _name: &str) -> Option<Value> {
        None
    }

    fn index(&self, _key: &Value) -> Option<Value> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to a host object. Equality is identity.
#[derive(Clone)]
pub struct ObjectRef(Arc<dyn HostObject>);

impl ObjectRef {
    pub fn new(object: impl HostObject) -> Self {
        ObjectRef(Arc::new(object))
    }

    pub fn downcast_ref<T: HostObject>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    pub fn member(&self, name: &str) -> Option<Value> {
        self.0.member(name)
    }

    pub fn index(&self, key: &Value) -> Option<Value> {
        self.0.index(key)
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

// ──────────────────────────────────────────────
// Runtime values
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent: an unset field or an unresolved optional argument.
    Null,
    Long(i64),
    Double(f64),
    Bool(bool),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Object(ObjectRef),
}

impl Value {
    /// Human-readable type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Long(_) => "Long",
            Value::Double(_) => "Double",
            Value::Bool(_) => "Boolean",
            Value::String(_) => "String",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Object(o) => o.type_name(),
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Any,
            Value::Long(_) => ValueType::Long,
            Value::Double(_) => ValueType::Double,
            Value::Bool(_) => ValueType::Boolean,
            Value::String(_) => ValueType::String,
            Value::List(_) => ValueType::List,
            Value::Map(_) => ValueType::Map,
            Value::Object(_) => ValueType::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(l) => Some(*l),
            _ => None,
        }
    }

    /// Numeric value widened to a double.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Long(l) => Some(*l as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this (non-null) value may be bound to a slot of type `ty`.
    pub fn conforms_to(&self, ty: ValueType) -> bool {
        ty.accepts(self.value_type()) && !(ty != ValueType::Any && self.is_null())
    }

    /// Bitwise identity, used to match memoized arguments: doubles compare by
    /// their bit pattern so `NaN` is identical to itself.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.identical(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.identical(vb))
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Long(l) => write!(f, "{}", l),
            // Debug keeps the fractional part ("6.0" rather than "6")
            Value::Double(d) => write!(f, "{:?}", d),
            Value::Bool(b) => write!(f, "{}", b),
            Value::String(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                f.write_str("}")
            }
            Value::Object(o) => write!(f, "{:?}", o),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// ──────────────────────────────────────────────
// Literals
// ──────────────────────────────────────────────

/// A constant as written in rule source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Long(i64),
    Double(f64),
    Bool(bool),
    String(String),
}

impl Literal {
    pub fn value_type(&self) -> ValueType {
        match self {
            Literal::Long(_) => ValueType::Long,
            Literal::Double(_) => ValueType::Double,
            Literal::Bool(_) => ValueType::Boolean,
            Literal::String(_) => ValueType::String,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Literal::Long(l) => Value::Long(*l),
            Literal::Double(d) => Value::Double(*d),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::String(s) => Value::String(s.clone()),
        }
    }

    /// Converts a scalar value back into a literal; used by constant folding.
    pub fn from_value(value: &Value) -> Option<Literal> {
        match value {
            Value::Long(l) => Some(Literal::Long(*l)),
            Value::Double(d) => Some(Literal::Double(*d)),
            Value::Bool(b) => Some(Literal::Bool(*b)),
            Value::String(s) => Some(Literal::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other.to_value()),
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    #[derive(Debug)]
    struct Marker;

    impl HostObject for Marker {
        fn type_name(&self) -> &'static str {
            "Marker"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn double_accepts_long_but_not_reverse() {
        assert!(ValueType::Double.accepts(ValueType::Long));
        assert!(!ValueType::Long.accepts(ValueType::Double));
        assert!(ValueType::String.accepts(ValueType::Any));
        assert!(!ValueType::String.accepts(ValueType::Boolean));
    }

    #[test]
    fn null_conforms_only_to_any() {
        assert!(Value::Null.conforms_to(ValueType::Any));
        assert!(!Value::Null.conforms_to(ValueType::String));
        assert!(Value::Long(1).conforms_to(ValueType::Double));
    }

    #[test]
    fn nan_is_identical_to_itself() {
        let a = Value::Double(f64::NAN);
        assert_ne!(a, a.clone());
        assert!(a.identical(&a.clone()));
    }

    #[test]
    fn long_and_double_are_not_identical() {
        assert!(!Value::Long(1).identical(&Value::Double(1.0)));
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = ObjectRef::new(Marker);
        let b = ObjectRef::new(Marker);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert!(a.downcast_ref::<Marker>().is_some());
        assert_eq!(Value::Object(a).type_name(), "Marker");
    }

    #[test]
    fn display_keeps_double_fraction() {
        assert_eq!(Value::Double(6.0).to_string(), "6.0");
        assert_eq!(Value::Long(6).to_string(), "6");
        let list = Value::List(vec![Value::Long(1), Value::from("a")]);
        assert_eq!(list.to_string(), "[1, a]");
    }

    #[test]
    fn literal_round_trips_through_json() {
        let lit = Literal::Double(2.5);
        let json = serde_json::to_value(&lit).unwrap();
        assert_eq!(json, serde_json::json!({ "double": 2.5 }));
        let back: Literal = serde_json::from_value(json).unwrap();
        assert_eq!(back, lit);
    }
}
