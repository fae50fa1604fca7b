//! Raw rule syntax as handed over by a parser front-end.
//!
//! This is the untyped, unbound tree form. It is (de)serializable so that
//! definitions can be exchanged as JSON; [`crate::rule::Rule::build`] lowers
//! it into the arena AST, binds call arguments and resolves types.

use serde::{Deserialize, Serialize};

use crate::ast::{ArithOp, CompareOp, LogicalOp, UnaryOp};
use crate::value::Literal;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawExpr {
    Literal {
        value: Literal,
    },
    /// `$message`
    Message,
    /// `$message.<name>`
    Field {
        name: String,
    },
    Var {
        name: String,
    },
    Unary {
        op: UnaryOp,
        operand: Box<RawExpr>,
    },
    Arith {
        op: ArithOp,
        left: Box<RawExpr>,
        right: Box<RawExpr>,
    },
    Compare {
        op: CompareOp,
        left: Box<RawExpr>,
        right: Box<RawExpr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<RawExpr>,
        right: Box<RawExpr>,
    },
    Ternary {
        condition: Box<RawExpr>,
        then: Box<RawExpr>,
        otherwise: Box<RawExpr>,
    },
    List {
        items: Vec<RawExpr>,
    },
    Map {
        entries: Vec<(String, RawExpr)>,
    },
    Member {
        target: Box<RawExpr>,
        name: String,
    },
    Index {
        target: Box<RawExpr>,
        index: Box<RawExpr>,
    },
    Call {
        function: String,
        #[serde(default)]
        args: Vec<RawArg>,
    },
}

/// A call-site argument, positional when `name` is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawArg {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub value: RawExpr,
}

impl RawArg {
    pub fn positional(value: RawExpr) -> Self {
        RawArg { name: None, value }
    }

    pub fn named(name: &str, value: RawExpr) -> Self {
        RawArg {
            name: Some(name.to_string()),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawStatement {
    Let {
        name: String,
        value: RawExpr,
    },
    Call {
        function: String,
        #[serde(default)]
        args: Vec<RawArg>,
    },
}

/// A complete rule as produced by the parser: `rule "name" when .. then .. end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAst {
    pub name: String,
    pub when: RawExpr,
    #[serde(default)]
    pub then: Vec<RawStatement>,
}

// ──────────────────────────────────────────────
// Constructors
// ──────────────────────────────────────────────

impl RawExpr {
    pub fn long(v: i64) -> Self {
        RawExpr::Literal {
            value: Literal::Long(v),
        }
    }

    pub fn double(v: f64) -> Self {
        RawExpr::Literal {
            value: Literal::Double(v),
        }
    }

    pub fn bool(v: bool) -> Self {
        RawExpr::Literal {
            value: Literal::Bool(v),
        }
    }

    pub fn string(v: &str) -> Self {
        RawExpr::Literal {
            value: Literal::String(v.to_string()),
        }
    }

    pub fn field(name: &str) -> Self {
        RawExpr::Field {
            name: name.to_string(),
        }
    }

    pub fn var(name: &str) -> Self {
        RawExpr::Var {
            name: name.to_string(),
        }
    }

    pub fn unary(op: UnaryOp, operand: RawExpr) -> Self {
        RawExpr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn not(operand: RawExpr) -> Self {
        RawExpr::unary(UnaryOp::Not, operand)
    }

    pub fn arith(op: ArithOp, left: RawExpr, right: RawExpr) -> Self {
        RawExpr::Arith {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn compare(op: CompareOp, left: RawExpr, right: RawExpr) -> Self {
        RawExpr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(left: RawExpr, right: RawExpr) -> Self {
        RawExpr::Logical {
            op: LogicalOp::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn or(left: RawExpr, right: RawExpr) -> Self {
        RawExpr::Logical {
            op: LogicalOp::Or,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn ternary(condition: RawExpr, then: RawExpr, otherwise: RawExpr) -> Self {
        RawExpr::Ternary {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn list(items: Vec<RawExpr>) -> Self {
        RawExpr::List { items }
    }

    pub fn map(entries: Vec<(&str, RawExpr)>) -> Self {
        RawExpr::Map {
            entries: entries
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        }
    }

    pub fn member(target: RawExpr, name: &str) -> Self {
        RawExpr::Member {
            target: Box::new(target),
            name: name.to_string(),
        }
    }

    pub fn index(target: RawExpr, index: RawExpr) -> Self {
        RawExpr::Index {
            target: Box::new(target),
            index: Box::new(index),
        }
    }

    /// Call with positional arguments only.
    pub fn call(function: &str, args: Vec<RawExpr>) -> Self {
        RawExpr::Call {
            function: function.to_string(),
            args: args.into_iter().map(RawArg::positional).collect(),
        }
    }

    pub fn call_with(function: &str, args: Vec<RawArg>) -> Self {
        RawExpr::Call {
            function: function.to_string(),
            args,
        }
    }
}

impl RawStatement {
    pub fn let_(name: &str, value: RawExpr) -> Self {
        RawStatement::Let {
            name: name.to_string(),
            value,
        }
    }

    pub fn call(function: &str, args: Vec<RawExpr>) -> Self {
        RawStatement::Call {
            function: function.to_string(),
            args: args.into_iter().map(RawArg::positional).collect(),
        }
    }

    pub fn call_with(function: &str, args: Vec<RawArg>) -> Self {
        RawStatement::Call {
            function: function.to_string(),
            args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rule_deserializes_from_json() {
        let rule: RuleAst = serde_json::from_value(json!({
            "name": "increment",
            "when": {
                "kind": "call",
                "function": "has_field",
                "args": [ { "value": { "kind": "literal", "value": { "string": "field" } } } ]
            },
            "then": [
                {
                    "kind": "call",
                    "function": "set_field",
                    "args": [
                        { "name": "field", "value": { "kind": "literal", "value": { "string": "field" } } },
                        { "name": "value", "value": {
                            "kind": "arith", "op": "add",
                            "left": { "kind": "field", "name": "field" },
                            "right": { "kind": "literal", "value": { "long": 1 } }
                        } }
                    ]
                }
            ]
        }))
        .unwrap();

        assert_eq!(rule.name, "increment");
        assert_eq!(
            rule.when,
            RawExpr::call("has_field", vec![RawExpr::string("field")])
        );
        assert_eq!(rule.then.len(), 1);
        match &rule.then[0] {
            RawStatement::Call { function, args } => {
                assert_eq!(function, "set_field");
                assert_eq!(args[1].name.as_deref(), Some("value"));
            }
            other => panic!("expected call statement, got {:?}", other),
        }
    }

    #[test]
    fn missing_then_defaults_to_empty() {
        let rule: RuleAst = serde_json::from_value(json!({
            "name": "noop",
            "when": { "kind": "literal", "value": { "bool": true } }
        }))
        .unwrap();
        assert!(rule.then.is_empty());
    }
}
