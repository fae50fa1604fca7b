//! Function signatures as seen by the rule builder.
//!
//! The builder only needs names, types and optionality to bind call
//! arguments and check them. Runtime concerns (defaults, transforms,
//! the function body) belong to the evaluator's function descriptors.

use std::collections::HashMap;

use crate::value::ValueType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSignature {
    pub name: String,
    pub ty: ValueType,
    /// Optional parameters may stay unbound; they resolve to absent.
    pub optional: bool,
    /// A required parameter with a default may also stay unbound.
    pub has_default: bool,
}

impl ParamSignature {
    pub fn required(name: &str, ty: ValueType) -> Self {
        ParamSignature {
            name: name.to_string(),
            ty,
            optional: false,
            has_default: false,
        }
    }

    pub fn optional(name: &str, ty: ValueType) -> Self {
        ParamSignature {
            optional: true,
            ..ParamSignature::required(name, ty)
        }
    }

    /// Whether a call may omit this parameter.
    pub fn may_be_unbound(&self) -> bool {
        self.optional || self.has_default
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub name: String,
    pub return_type: ValueType,
    pub params: Vec<ParamSignature>,
    /// Pure functions may be memoized per evaluation context.
    pub pure: bool,
}

impl FunctionSignature {
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }
}

/// Name to signature lookup used while building rules.
pub trait FunctionTable {
    fn signature(&self, name: &str) -> Option<&FunctionSignature>;
}

impl FunctionTable for HashMap<String, FunctionSignature> {
    fn signature(&self, name: &str) -> Option<&FunctionSignature> {
        self.get(name)
    }
}
