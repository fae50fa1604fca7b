//! `lookup(lookup_table, key, default?)` over host-provided tables.

use std::collections::HashMap;
use std::sync::Arc;

use conduit_core::{Value, ValueType};
use parking_lot::RwLock;

use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::function::{Function, FunctionArgs, FunctionDescriptor, ParameterDescriptor};

/// Keyed tables owned by the host. Calls are synchronous; a table that does
/// I/O blocks the evaluating thread.
pub trait LookupTables: Send + Sync {
    fn has_table(&self, table: &str) -> bool;

    /// `Ok(None)` when the key has no value.
    fn lookup(&self, table: &str, key: &Value) -> Result<Option<Value>, String>;
}

/// Tables held in memory, keyed by the key's string form.
#[derive(Debug, Default)]
pub struct InMemoryLookupTables {
    tables: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl InMemoryLookupTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, table: &str, key: impl Into<Value>, value: impl Into<Value>) {
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .insert(key.into().to_string(), value.into());
    }

    /// Make sure a table exists, even if it holds no entries.
    pub fn create_table(&self, table: &str) {
        self.tables.write().entry(table.to_string()).or_default();
    }
}

impl LookupTables for InMemoryLookupTables {
    fn has_table(&self, table: &str) -> bool {
        self.tables.read().contains_key(table)
    }

    fn lookup(&self, table: &str, key: &Value) -> Result<Option<Value>, String> {
        let tables = self.tables.read();
        let entries = tables
            .get(table)
            .ok_or_else(|| format!("unknown lookup table '{table}'"))?;
        Ok(entries.get(&key.to_string()).cloned())
    }
}

pub struct Lookup {
    descriptor: FunctionDescriptor,
    tables: Arc<dyn LookupTables>,
}

impl Lookup {
    pub fn new(tables: Arc<dyn LookupTables>) -> Self {
        let known = Arc::clone(&tables);
        let descriptor = FunctionDescriptor::builder("lookup")
            .returns(ValueType::Any)
            .param(
                ParameterDescriptor::string("lookup_table")
                    .transform(move |name| {
                        if name.as_str().is_some_and(|table| known.has_table(table)) {
                            Ok(name)
                        } else {
                            Err(format!("unknown lookup table '{name}'"))
                        }
                    })
                    .description("Name of the table, checked when the rule is loaded"),
            )
            .param(ParameterDescriptor::any("key"))
            .param(ParameterDescriptor::any("default").optional())
            .description("Looks up a value, falling back to the default")
            .build();
        Lookup { descriptor, tables }
    }
}

impl Function for Lookup {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &self,
        args: &mut FunctionArgs<'_>,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Value, EvalError> {
        let Some(key) = args.optional("key", ctx)? else {
            return args.resolve("default", ctx);
        };
        let table = args.required_string("lookup_table", ctx)?;
        match self.tables.lookup(&table, &key) {
            Ok(Some(value)) if !value.is_null() => Ok(value),
            Ok(_) => args.resolve("default", ctx),
            Err(message) => Err(EvalError::function("lookup", message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{invoke, ValueArgs};
    use crate::functions::testing::message;

    fn lookup() -> Lookup {
        let tables = InMemoryLookupTables::new();
        tables.insert("geo", "10.0.0.1", "internal");
        tables.insert("ports", 443i64, "https");
        Lookup::new(Arc::new(tables))
    }

    fn run(function: &Lookup, args: Vec<Option<Value>>) -> Result<Value, EvalError> {
        let mut m = message();
        let mut ctx = EvaluationContext::new(&mut m);
        invoke(function, &ValueArgs(args), &[], &mut ctx)
    }

    #[test]
    fn finds_values_by_key() {
        let f = lookup();
        assert_eq!(
            run(&f, vec![Some("geo".into()), Some("10.0.0.1".into())]),
            Ok(Value::from("internal"))
        );
        assert_eq!(
            run(&f, vec![Some("ports".into()), Some(Value::Long(443))]),
            Ok(Value::from("https"))
        );
    }

    #[test]
    fn missing_key_yields_default() {
        let f = lookup();
        assert_eq!(
            run(&f, vec![Some("geo".into()), Some("1.1.1.1".into()), Some("external".into())]),
            Ok(Value::from("external"))
        );
        assert_eq!(
            run(&f, vec![Some("geo".into()), Some(Value::Null)]),
            Ok(Value::Null)
        );
    }

    #[test]
    fn unknown_table_fails_the_transform() {
        let f = lookup();
        let err = run(&f, vec![Some("nope".into()), Some("k".into())]).unwrap_err();
        assert!(matches!(err, EvalError::PrecomputeFailure { .. }));
    }
}
