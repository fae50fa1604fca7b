//! String functions, including `regex`.

use std::any::Any;
use std::collections::BTreeMap;

use conduit_core::{HostObject, ObjectRef, Value, ValueType};
use regex::Regex;

use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::function::{
    FunctionArgs, FunctionDescriptor, FunctionRegistry, NativeFunction, ParameterDescriptor,
};

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(NativeFunction::new(
        FunctionDescriptor::builder("regex")
            .returns(ValueType::Object)
            .pure()
            .param(
                ParameterDescriptor::string("pattern")
                    .transform(compile_pattern)
                    .description("Pattern the whole value must match"),
            )
            .param(ParameterDescriptor::string("value"))
            .param(
                ParameterDescriptor::list("group_names")
                    .optional()
                    .description("Names for the capture groups, in order"),
            )
            .build(),
        regex_match,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::builder("contains")
            .returns(ValueType::Boolean)
            .pure()
            .param(ParameterDescriptor::string("value"))
            .param(ParameterDescriptor::string("search"))
            .param(ParameterDescriptor::boolean("ignore_case").default_value(|| Value::Bool(false)))
            .build(),
        contains,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::builder("lowercase")
            .returns(ValueType::String)
            .pure()
            .param(ParameterDescriptor::string("value"))
            .build(),
        lowercase,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::builder("uppercase")
            .returns(ValueType::String)
            .pure()
            .param(ParameterDescriptor::string("value"))
            .build(),
        uppercase,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::builder("concat")
            .returns(ValueType::String)
            .pure()
            .param(ParameterDescriptor::string("first"))
            .param(ParameterDescriptor::string("second"))
            .build(),
        concat,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::builder("substring")
            .returns(ValueType::String)
            .pure()
            .param(ParameterDescriptor::string("value"))
            .param(ParameterDescriptor::long("start"))
            .param(ParameterDescriptor::long("end").optional())
            .description("Negative offsets count from the end of the string")
            .build(),
        substring,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::builder("abbreviate")
            .returns(ValueType::String)
            .pure()
            .param(ParameterDescriptor::string("value"))
            .param(ParameterDescriptor::long("width"))
            .build(),
        abbreviate,
    ));
}

// ──────────────────────────────────────────────
// regex
// ──────────────────────────────────────────────

/// A pattern compiled from a `regex` call's `pattern` argument.
#[derive(Debug)]
struct CompiledPattern(Regex);

impl HostObject for CompiledPattern {
    fn type_name(&self) -> &'static str {
        "Pattern"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn compile_pattern(value: Value) -> Result<Value, String> {
    let Value::String(pattern) = value else {
        return Err(format!("pattern must be a string, got {}", value.type_name()));
    };
    let anchored = format!("^(?:{pattern})$");
    Regex::new(&anchored)
        .map(|regex| Value::Object(ObjectRef::new(CompiledPattern(regex))))
        .map_err(|e| format!("invalid pattern '{pattern}': {e}"))
}

/// Outcome of `regex(...)`. `.matches` tells whether the value matched,
/// `.groups` holds the captured groups and `result["name"]` reads one.
#[derive(Debug, Clone, PartialEq)]
pub struct RegexMatch {
    matched: bool,
    groups: BTreeMap<String, String>,
}

impl RegexMatch {
    pub fn matches(&self) -> bool {
        self.matched
    }

    pub fn groups(&self) -> &BTreeMap<String, String> {
        &self.groups
    }

    fn capture(regex: &Regex, value: &str, group_names: &[String]) -> Self {
        let Some(captures) = regex.captures(value) else {
            return RegexMatch {
                matched: false,
                groups: BTreeMap::new(),
            };
        };
        let mut groups = BTreeMap::new();
        // Group 0 is the anchoring wrapper's whole match.
        for (k, own_name) in regex.capture_names().enumerate().skip(1) {
            let Some(m) = captures.get(k) else { continue };
            let name = group_names
                .get(k - 1)
                .cloned()
                .or_else(|| own_name.map(str::to_string))
                .unwrap_or_else(|| (k - 1).to_string());
            groups.insert(name, m.as_str().to_string());
        }
        RegexMatch {
            matched: true,
            groups,
        }
    }
}

impl HostObject for RegexMatch {
    fn type_name(&self) -> &'static str {
        "RegexMatch"
    }

    fn member(&self, name: &str) -> Option<Value> {
        match name {
            "matches" => Some(Value::Bool(self.matched)),
            "groups" => Some(Value::Map(
                self.groups
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                    .collect(),
            )),
            _ => None,
        }
    }

    fn index(&self, key: &Value) -> Option<Value> {
        let key = key.as_str()?;
        self.groups.get(key).map(|v| Value::from(v.as_str()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn regex_match(args: &mut FunctionArgs<'_>, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvalError> {
    let pattern = args.required("pattern", ctx)?;
    let value = args.required_string("value", ctx)?;
    let group_names: Vec<String> = match args.optional("group_names", ctx)? {
        Some(Value::List(names)) => names.iter().map(|n| n.to_string()).collect(),
        _ => Vec::new(),
    };
    let compiled = match &pattern {
        Value::Object(object) => object.downcast_ref::<CompiledPattern>(),
        _ => None,
    }
    .ok_or_else(|| EvalError::function("regex", "pattern was not compiled"))?;
    let result = RegexMatch::capture(&compiled.0, &value, &group_names);
    Ok(Value::Object(ObjectRef::new(result)))
}

// ──────────────────────────────────────────────
// Text
// ──────────────────────────────────────────────

fn contains(args: &mut FunctionArgs<'_>, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvalError> {
    let value = args.required_string("value", ctx)?;
    let search = args.required_string("search", ctx)?;
    let found = if args.optional_bool("ignore_case", ctx)?.unwrap_or(false) {
        value.to_lowercase().contains(&search.to_lowercase())
    } else {
        value.contains(&search)
    };
    Ok(Value::Bool(found))
}

fn lowercase(args: &mut FunctionArgs<'_>, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvalError> {
    Ok(Value::String(args.required_string("value", ctx)?.to_lowercase()))
}

fn uppercase(args: &mut FunctionArgs<'_>, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvalError> {
    Ok(Value::String(args.required_string("value", ctx)?.to_uppercase()))
}

/// Absent operands count as empty strings.
fn concat(args: &mut FunctionArgs<'_>, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvalError> {
    let first = args.optional_string("first", ctx)?.unwrap_or_default();
    let second = args.optional_string("second", ctx)?.unwrap_or_default();
    Ok(Value::String(first + &second))
}

fn substring(args: &mut FunctionArgs<'_>, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvalError> {
    let value = args.required_string("value", ctx)?;
    let start = args.required_long("start", ctx)?;
    let end = args.optional_long("end", ctx)?;
    let chars: Vec<char> = value.chars().collect();
    let len = chars.len() as i64;
    let clamp = |offset: i64| {
        let offset = if offset < 0 { len + offset } else { offset };
        offset.clamp(0, len) as usize
    };
    let (start, end) = (clamp(start), clamp(end.unwrap_or(len)));
    if start >= end {
        return Ok(Value::from(""));
    }
    Ok(Value::String(chars[start..end].iter().collect()))
}

fn abbreviate(args: &mut FunctionArgs<'_>, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvalError> {
    let value = args.required_string("value", ctx)?;
    let width = args.required_long("width", ctx)?;
    if width < 4 {
        return Err(EvalError::function(
            "abbreviate",
            format!("minimum width is 4, got {width}"),
        ));
    }
    let width = width as usize;
    if value.chars().count() <= width {
        return Ok(Value::String(value));
    }
    let mut short: String = value.chars().take(width - 3).collect();
    short.push_str("...");
    Ok(Value::String(short))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::testing::call;

    fn s(text: &str) -> Option<Value> {
        Some(Value::from(text))
    }

    fn regex(pattern: &str, value: &str, names: Option<Vec<&str>>) -> RegexMatch {
        let names = names.map(|n| Value::List(n.into_iter().map(Value::from).collect()));
        let result = call("regex", vec![s(pattern), s(value), names]).unwrap();
        let Value::Object(object) = result else {
            panic!("regex returned {result:?}");
        };
        object.downcast_ref::<RegexMatch>().unwrap().clone()
    }

    #[test]
    fn regex_matches_the_whole_value() {
        assert!(regex("a+", "aaa", None).matches());
        assert!(!regex("a+", "baaa", None).matches());
    }

    #[test]
    fn regex_group_naming() {
        let m = regex(r"(\w+)=(?P<val>\d+)(x)?", "k=12", Some(vec!["key"]));
        assert_eq!(m.groups().get("key").map(String::as_str), Some("k"));
        assert_eq!(m.groups().get("val").map(String::as_str), Some("12"));
        // unmatched optional group is omitted
        assert_eq!(m.groups().len(), 2);

        let m = regex(r"(\d)-(\d)", "1-2", None);
        assert_eq!(m.groups().get("0").map(String::as_str), Some("1"));
        assert_eq!(m.groups().get("1").map(String::as_str), Some("2"));
    }

    #[test]
    fn regex_result_is_accessible_as_object() {
        let m = regex(r"(?P<n>\d+)", "7", None);
        assert_eq!(m.member("matches"), Some(Value::Bool(true)));
        assert_eq!(m.index(&Value::from("n")), Some(Value::from("7")));
        assert_eq!(m.index(&Value::from("missing")), None);
    }

    #[test]
    fn invalid_pattern_is_a_precompute_failure() {
        let err = call("regex", vec![s("("), s("x")]).unwrap_err();
        assert!(matches!(err, EvalError::PrecomputeFailure { .. }));
    }

    #[test]
    fn contains_respects_ignore_case() {
        assert_eq!(call("contains", vec![s("Hello"), s("ell")]), Ok(Value::Bool(true)));
        assert_eq!(call("contains", vec![s("Hello"), s("HELL")]), Ok(Value::Bool(false)));
        assert_eq!(
            call("contains", vec![s("Hello"), s("HELL"), Some(Value::Bool(true))]),
            Ok(Value::Bool(true))
        );
    }

    #[test]
    fn case_conversion() {
        assert_eq!(call("lowercase", vec![s("AbC")]), Ok(Value::from("abc")));
        assert_eq!(call("uppercase", vec![s("AbC")]), Ok(Value::from("ABC")));
    }

    #[test]
    fn concat_treats_absent_as_empty() {
        assert_eq!(call("concat", vec![s("a"), s("b")]), Ok(Value::from("ab")));
        assert_eq!(call("concat", vec![Some(Value::Null), s("b")]), Ok(Value::from("b")));
    }

    #[test]
    fn substring_offsets() {
        let sub = |start: i64, end: Option<i64>| {
            call("substring", vec![s("abcdef"), Some(Value::Long(start)), end.map(Value::Long)])
        };
        assert_eq!(sub(1, Some(3)), Ok(Value::from("bc")));
        assert_eq!(sub(2, None), Ok(Value::from("cdef")));
        assert_eq!(sub(-2, None), Ok(Value::from("ef")));
        assert_eq!(sub(0, Some(-1)), Ok(Value::from("abcde")));
        assert_eq!(sub(4, Some(2)), Ok(Value::from("")));
        assert_eq!(sub(2, Some(100)), Ok(Value::from("cdef")));
    }

    #[test]
    fn abbreviate_width() {
        assert_eq!(
            call("abbreviate", vec![s("abcdefgh"), Some(Value::Long(6))]),
            Ok(Value::from("abc..."))
        );
        assert_eq!(
            call("abbreviate", vec![s("abc"), Some(Value::Long(6))]),
            Ok(Value::from("abc"))
        );
        assert!(call("abbreviate", vec![s("abcdefgh"), Some(Value::Long(3))]).is_err());
    }
}
