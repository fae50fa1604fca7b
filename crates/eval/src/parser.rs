//! Rule source parsing.
//!
//! The engine never reads rule text itself; it hands each stored source to
//! a [`RuleParser`]. [`JsonRuleParser`] reads the JSON form of the rule
//! syntax tree.

use conduit_core::RuleAst;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid rule JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Syntax(String),
}

pub trait RuleParser: Send + Sync {
    fn parse(&self, source: &str) -> Result<RuleAst, ParseError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRuleParser;

impl RuleParser for JsonRuleParser {
    fn parse(&self, source: &str) -> Result<RuleAst, ParseError> {
        let ast: RuleAst = serde_json::from_str(source)?;
        if ast.name.trim().is_empty() {
            return Err(ParseError::Syntax("rule name must not be empty".to_string()));
        }
        Ok(ast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_the_json_syntax_tree() {
        let source = json!({
            "name": "increment",
            "when": {"kind": "call", "function": "has_field", "args": [
                {"value": {"kind": "literal", "value": {"string": "field"}}}
            ]},
            "then": []
        })
        .to_string();
        let ast = JsonRuleParser.parse(&source).unwrap();
        assert_eq!(ast.name, "increment");
        assert!(ast.then.is_empty());
    }

    #[test]
    fn rejects_malformed_sources() {
        assert!(matches!(
            JsonRuleParser.parse("{"),
            Err(ParseError::Json(_))
        ));
        let unnamed = json!({"name": " ", "when": {"kind": "message"}}).to_string();
        assert!(matches!(
            JsonRuleParser.parse(&unnamed),
            Err(ParseError::Syntax(_))
        ));
    }
}
