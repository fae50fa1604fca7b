use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Id of the stream every message starts out in.
pub const DEFAULT_STREAM_ID: &str = "000000000000000000000001";

/// A stored rule: its source text plus bookkeeping.
///
/// The source is handed to a rule parser at load time; the title is the
/// name pipelines use to reference the rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub source: String,
    /// RFC 3339 timestamp string.
    #[serde(default)]
    pub modified_at: Option<String>,
}

/// Stage match policy as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageMatch {
    All,
    Either,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDefinition {
    pub stage: i32,
    pub match_policy: StageMatch,
    /// Rule titles, in evaluation order.
    pub rules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub stages: Vec<StageDefinition>,
}

/// Pipelines attached to one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConnections {
    pub stream_id: String,
    pub pipeline_ids: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    pub id: String,
    pub title: String,
    /// Routing a message here removes it from the default stream.
    #[serde(default)]
    pub remove_matches_from_default_stream: bool,
}

/// Everything a store holds, as one serializable document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionBundle {
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
    #[serde(default)]
    pub pipelines: Vec<PipelineDefinition>,
    #[serde(default)]
    pub connections: Vec<PipelineConnections>,
    #[serde(default)]
    pub streams: Vec<StreamRecord>,
}
