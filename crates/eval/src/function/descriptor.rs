use std::fmt;
use std::sync::Arc;

use conduit_core::{FunctionSignature, ParamSignature, Value, ValueType};

/// Supplies the value of an unbound parameter.
pub type DefaultFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// Turns a bound argument into the form the function body consumes, for
/// example a pattern string into a compiled regex.
pub type TransformFn = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

#[derive(Clone)]
pub struct ParameterDescriptor {
    name: String,
    ty: ValueType,
    optional: bool,
    default: Option<DefaultFn>,
    transform: Option<TransformFn>,
    description: Option<String>,
}

impl ParameterDescriptor {
    pub fn new(name: &str, ty: ValueType) -> Self {
        ParameterDescriptor {
            name: name.to_string(),
            ty,
            optional: false,
            default: None,
            transform: None,
            description: None,
        }
    }

    pub fn any(name: &str) -> Self {
        Self::new(name, ValueType::Any)
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, ValueType::String)
    }

    pub fn long(name: &str) -> Self {
        Self::new(name, ValueType::Long)
    }

    pub fn double(name: &str) -> Self {
        Self::new(name, ValueType::Double)
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, ValueType::Boolean)
    }

    pub fn list(name: &str) -> Self {
        Self::new(name, ValueType::List)
    }

    pub fn map(name: &str) -> Self {
        Self::new(name, ValueType::Map)
    }

    pub fn object(name: &str) -> Self {
        Self::new(name, ValueType::Object)
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn default_value(mut self, supplier: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(Arc::new(supplier));
        self
    }

    pub fn transform(
        mut self,
        transform: impl Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> ValueType {
        self.ty
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn default_supplier(&self) -> Option<&DefaultFn> {
        self.default.as_ref()
    }

    pub fn transformer(&self) -> Option<&TransformFn> {
        self.transform.as_ref()
    }

    pub fn describe(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn signature(&self) -> ParamSignature {
        ParamSignature {
            name: self.name.clone(),
            ty: self.ty,
            optional: self.optional,
            has_default: self.default.is_some(),
        }
    }
}

impl fmt::Debug for ParameterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterDescriptor")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("optional", &self.optional)
            .field("default", &self.default.is_some())
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

/// Everything known about a function before it is called.
#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    signature: FunctionSignature,
    params: Vec<ParameterDescriptor>,
    description: Option<String>,
}

impl FunctionDescriptor {
    pub fn builder(name: &str) -> FunctionDescriptorBuilder {
        FunctionDescriptorBuilder {
            name: name.to_string(),
            return_type: ValueType::Void,
            params: Vec::new(),
            pure: false,
            description: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn return_type(&self) -> ValueType {
        self.signature.return_type
    }

    pub fn is_pure(&self) -> bool {
        self.signature.pure
    }

    pub fn params(&self) -> &[ParameterDescriptor] {
        &self.params
    }

    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.signature.param_index(name)
    }

    pub fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

pub struct FunctionDescriptorBuilder {
    name: String,
    return_type: ValueType,
    params: Vec<ParameterDescriptor>,
    pure: bool,
    description: Option<String>,
}

impl FunctionDescriptorBuilder {
    pub fn returns(mut self, ty: ValueType) -> Self {
        self.return_type = ty;
        self
    }

    pub fn param(mut self, param: ParameterDescriptor) -> Self {
        self.params.push(param);
        self
    }

    /// Mark the function as free of side effects, so results may be
    /// memoized per evaluation.
    pub fn pure(mut self) -> Self {
        self.pure = true;
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    pub fn build(self) -> FunctionDescriptor {
        FunctionDescriptor {
            signature: FunctionSignature {
                name: self.name,
                return_type: self.return_type,
                params: self.params.iter().map(ParameterDescriptor::signature).collect(),
                pure: self.pure,
            },
            params: self.params,
            description: self.description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_derives_the_signature() {
        let d = FunctionDescriptor::builder("to_long")
            .returns(ValueType::Long)
            .pure()
            .param(ParameterDescriptor::any("value"))
            .param(ParameterDescriptor::long("default").default_value(|| Value::Long(0)))
            .build();
        let sig = d.signature();
        assert_eq!(sig.name, "to_long");
        assert!(sig.pure);
        assert!(!sig.params[0].may_be_unbound());
        assert!(sig.params[1].has_default);
        assert!(sig.params[1].may_be_unbound());
        assert_eq!(d.param_index("default"), Some(1));
    }
}
