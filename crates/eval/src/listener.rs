//! Evaluation events.
//!
//! The engine reports what it does to an [`EvaluationListener`]. The
//! default [`NoopListener`] ignores everything; [`RecordingListener`] keeps
//! the events, which is what `PipelineEngine::simulate` returns.

use serde::Serialize;

use crate::error::EvalError;

/// Receives one evaluation request's events, in order. Every method has an
/// empty default.
#[allow(unused_variables)]
pub trait EvaluationListener {
    fn pipeline_started(&mut self, message_id: &str, pipeline: &str) {}

    fn pipeline_finished(&mut self, message_id: &str, pipeline: &str) {}

    fn stage_evaluated(&mut self, message_id: &str, pipeline: &str, stage: i32, matched: bool) {}

    fn rule_evaluated(&mut self, message_id: &str, rule: &str, matched: bool) {}

    /// `when` failed; the rule counts as not matched.
    fn rule_failed(&mut self, message_id: &str, rule: &str, error: &EvalError) {}

    fn rule_executed(&mut self, message_id: &str, rule: &str) {}

    /// A `then` statement failed; the remaining statements were skipped.
    fn rule_execution_failed(&mut self, message_id: &str, rule: &str, error: &EvalError) {}

    fn message_created(&mut self, parent_id: &str, message_id: &str) {}

    fn message_dropped(&mut self, message_id: &str) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl EvaluationListener for NoopListener {}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EvaluationEvent {
    PipelineStarted {
        message_id: String,
        pipeline: String,
    },
    PipelineFinished {
        message_id: String,
        pipeline: String,
    },
    StageEvaluated {
        message_id: String,
        pipeline: String,
        stage: i32,
        matched: bool,
    },
    RuleEvaluated {
        message_id: String,
        rule: String,
        matched: bool,
    },
    RuleFailed {
        message_id: String,
        rule: String,
        error: String,
    },
    RuleExecuted {
        message_id: String,
        rule: String,
    },
    RuleExecutionFailed {
        message_id: String,
        rule: String,
        error: String,
    },
    MessageCreated {
        parent_id: String,
        message_id: String,
    },
    MessageDropped {
        message_id: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    events: Vec<EvaluationEvent>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[EvaluationEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<EvaluationEvent> {
        self.events
    }
}

impl EvaluationListener for RecordingListener {
    fn pipeline_started(&mut self, message_id: &str, pipeline: &str) {
        self.events.push(EvaluationEvent::PipelineStarted {
            message_id: message_id.to_string(),
            pipeline: pipeline.to_string(),
        });
    }

    fn pipeline_finished(&mut self, message_id: &str, pipeline: &str) {
        self.events.push(EvaluationEvent::PipelineFinished {
            message_id: message_id.to_string(),
            pipeline: pipeline.to_string(),
        });
    }

    fn stage_evaluated(&mut self, message_id: &str, pipeline: &str, stage: i32, matched: bool) {
        self.events.push(EvaluationEvent::StageEvaluated {
            message_id: message_id.to_string(),
            pipeline: pipeline.to_string(),
            stage,
            matched,
        });
    }

    fn rule_evaluated(&mut self, message_id: &str, rule: &str, matched: bool) {
        self.events.push(EvaluationEvent::RuleEvaluated {
            message_id: message_id.to_string(),
            rule: rule.to_string(),
            matched,
        });
    }

    fn rule_failed(&mut self, message_id: &str, rule: &str, error: &EvalError) {
        self.events.push(EvaluationEvent::RuleFailed {
            message_id: message_id.to_string(),
            rule: rule.to_string(),
            error: error.to_string(),
        });
    }

    fn rule_executed(&mut self, message_id: &str, rule: &str) {
        self.events.push(EvaluationEvent::RuleExecuted {
            message_id: message_id.to_string(),
            rule: rule.to_string(),
        });
    }

    fn rule_execution_failed(&mut self, message_id: &str, rule: &str, error: &EvalError) {
        self.events.push(EvaluationEvent::RuleExecutionFailed {
            message_id: message_id.to_string(),
            rule: rule.to_string(),
            error: error.to_string(),
        });
    }

    fn message_created(&mut self, parent_id: &str, message_id: &str) {
        self.events.push(EvaluationEvent::MessageCreated {
            parent_id: parent_id.to_string(),
            message_id: message_id.to_string(),
        });
    }

    fn message_dropped(&mut self, message_id: &str) {
        self.events.push(EvaluationEvent::MessageDropped {
            message_id: message_id.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_a_tag() {
        let mut listener = RecordingListener::new();
        listener.stage_evaluated("m1", "p-main", 0, true);
        listener.rule_failed("m1", "r", &EvalError::function("f", "boom"));
        let json = serde_json::to_value(listener.events()).unwrap();
        assert_eq!(json[0]["event"], "stage_evaluated");
        assert_eq!(json[0]["stage"], 0);
        assert_eq!(json[1]["error"], "f: boom");
    }
}
