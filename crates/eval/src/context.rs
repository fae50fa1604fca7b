//! Per-message evaluation state.
//!
//! One [`EvaluationContext`] lives for the processing of one message in one
//! evaluation request. It borrows the message mutably, so two evaluations
//! can never share it.

use std::collections::HashMap;
use std::sync::Arc;

use conduit_core::Value;

use crate::error::EvalError;
use crate::message::{Message, MessageHandle};

// ──────────────────────────────────────────────
// Memoization
// ──────────────────────────────────────────────

/// One memoized call of a pure function: the arguments its body resolved,
/// as `(position, value)` in the order it resolved them, and the result.
///
/// A pure body asks for the same next argument whenever the arguments it
/// has seen so far are the same, so replaying `resolved` in order never
/// evaluates an argument the body would have skipped.
#[derive(Debug, Clone)]
pub(crate) struct MemoEntry {
    pub(crate) resolved: Vec<(usize, Value)>,
    pub(crate) result: Value,
}

#[derive(Debug, Default)]
struct MemoCache {
    entries: HashMap<String, Arc<Vec<MemoEntry>>>,
    hits: u64,
}

// ──────────────────────────────────────────────
// Context
// ──────────────────────────────────────────────

pub struct EvaluationContext<'m> {
    message: &'m mut Message,
    vars: HashMap<String, Value>,
    created: Vec<Message>,
    memo: Option<MemoCache>,
}

impl<'m> EvaluationContext<'m> {
    pub fn new(message: &'m mut Message) -> Self {
        EvaluationContext {
            message,
            vars: HashMap::new(),
            created: Vec::new(),
            memo: Some(MemoCache::default()),
        }
    }

    /// A context that never memoizes pure function results.
    pub fn without_memoization(message: &'m mut Message) -> Self {
        EvaluationContext {
            memo: None,
            ..Self::new(message)
        }
    }

    pub fn message(&self) -> &Message {
        &*self.message
    }

    pub fn message_mut(&mut self) -> &mut Message {
        &mut *self.message
    }

    /// Resolve a message handle to the message it refers to.
    pub fn resolve(&mut self, handle: MessageHandle) -> Result<&mut Message, EvalError> {
        match handle.0 {
            0 => Ok(&mut *self.message),
            n => self
                .created
                .get_mut(n - 1)
                .ok_or(EvalError::InvalidMessageHandle { index: n }),
        }
    }

    /// Resolve an optional `message` argument, defaulting to the current
    /// message.
    pub fn target(&mut self, handle: Option<&Value>) -> Result<&mut Message, EvalError> {
        match handle {
            None | Some(Value::Null) => Ok(&mut *self.message),
            Some(value) => {
                let handle = MessageHandle::from_value(value)
                    .ok_or(EvalError::InvalidMessageHandle { index: usize::MAX })?;
                self.resolve(handle)
            }
        }
    }

    // ── Variables ────────────────────────────────────────────────────────

    pub fn define(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    pub fn var(&self, name: &str) -> Result<Value, EvalError> {
        self.vars
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnboundVariable {
                name: name.to_string(),
            })
    }

    /// Forget all variables; called between rules.
    pub fn clear_vars(&mut self) {
        self.vars.clear();
    }

    // ── Created messages ─────────────────────────────────────────────────

    /// Record a new message and return its handle.
    pub fn add_created(&mut self, message: Message) -> MessageHandle {
        self.created.push(message);
        MessageHandle(self.created.len())
    }

    pub fn created(&self) -> &[Message] {
        &self.created
    }

    pub fn take_created(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.created)
    }

    // ── Memoization ──────────────────────────────────────────────────────

    pub fn memoizes(&self) -> bool {
        self.memo.is_some()
    }

    /// Recorded calls of `function`, oldest first.
    pub(crate) fn memo_entries(&self, function: &str) -> Option<Arc<Vec<MemoEntry>>> {
        self.memo.as_ref()?.entries.get(function).cloned()
    }

    pub(crate) fn memo_hit(&mut self) {
        if let Some(memo) = self.memo.as_mut() {
            memo.hits += 1;
        }
    }

    pub(crate) fn memo_insert(
        &mut self,
        function: &str,
        resolved: Vec<(usize, Value)>,
        result: Value,
    ) {
        if let Some(memo) = self.memo.as_mut() {
            let entries = memo.entries.entry(function.to_string()).or_default();
            Arc::make_mut(entries).push(MemoEntry { resolved, result });
        }
    }

    /// Number of calls answered from the memo cache.
    pub fn memo_hits(&self) -> u64 {
        self.memo.as_ref().map_or(0, |m| m.hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn message() -> Message {
        Message::new("m", "test", datetime!(2025-01-01 00:00:00 UTC))
    }

    #[test]
    fn handles_resolve_to_current_and_created() {
        let mut m = message();
        let mut ctx = EvaluationContext::new(&mut m);
        let child = message().with_field("child", true);
        let handle = ctx.add_created(child);
        assert_eq!(handle, MessageHandle(1));
        assert!(ctx.resolve(handle).unwrap().has_field("child"));
        assert!(!ctx.resolve(MessageHandle::CURRENT).unwrap().has_field("child"));
        assert_eq!(
            ctx.resolve(MessageHandle(2)).unwrap_err(),
            EvalError::InvalidMessageHandle { index: 2 }
        );
    }

    #[test]
    fn variables_are_cleared_between_rules() {
        let mut m = message();
        let mut ctx = EvaluationContext::new(&mut m);
        ctx.define("x", Value::Long(1));
        assert_eq!(ctx.var("x"), Ok(Value::Long(1)));
        ctx.clear_vars();
        assert!(ctx.var("x").is_err());
    }

    #[test]
    fn memo_records_calls_per_function() {
        let mut m = message();
        let mut ctx = EvaluationContext::new(&mut m);
        ctx.memo_insert("f", vec![(0, Value::Long(1))], Value::from("one"));
        ctx.memo_insert("f", vec![(0, Value::Long(2))], Value::from("two"));
        let entries = ctx.memo_entries("f").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].result, Value::from("two"));
        assert!(ctx.memo_entries("g").is_none());
    }

    #[test]
    fn memoization_can_be_disabled() {
        let mut m = message();
        let mut ctx = EvaluationContext::without_memoization(&mut m);
        ctx.memo_insert("f", vec![], Value::Long(1));
        ctx.memo_hit();
        assert!(ctx.memo_entries("f").is_none());
        assert_eq!(ctx.memo_hits(), 0);
        assert!(!ctx.memoizes());
    }
}
