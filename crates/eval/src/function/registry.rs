use std::collections::HashMap;
use std::sync::Arc;

use conduit_core::{FunctionSignature, FunctionTable};

use super::Function;
use crate::functions;

/// Name to function mapping. Built at startup and shared read-only by
/// every evaluation afterwards.
#[derive(Default, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in library. Functions that need host
    /// services (lookup tables, named stream routing) are added with
    /// [`FunctionRegistry::register`].
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        functions::register_builtins(&mut registry);
        registry
    }

    /// Add a function, replacing any function of the same name.
    pub fn register(&mut self, function: impl Function + 'static) -> Option<Arc<dyn Function>> {
        let name = function.descriptor().name().to_string();
        self.functions.insert(name, Arc::new(function))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Function>> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl FunctionTable for FunctionRegistry {
    fn signature(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.get(name).map(|f| f.descriptor().signature())
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}
