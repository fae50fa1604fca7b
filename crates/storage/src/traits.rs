use std::collections::BTreeSet;

use crate::error::StorageError;
use crate::record::{PipelineDefinition, RuleDefinition, StreamRecord};

/// Source of rule and pipeline definitions.
///
/// Consulted only when the engine (re)builds its snapshot, never while a
/// message is being evaluated.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` so a reload can be triggered from
/// any worker thread.
pub trait DefinitionSource: Send + Sync {
    /// All stored rules.
    fn load_rules(&self) -> Result<Vec<RuleDefinition>, StorageError>;

    /// All stored pipelines.
    fn load_pipelines(&self) -> Result<Vec<PipelineDefinition>, StorageError>;
}

/// Maps streams to the pipelines connected to them.
pub trait ConnectionResolver: Send + Sync {
    /// Union of the pipelines connected to any of `stream_ids`. Streams
    /// without connections contribute nothing.
    fn resolve_pipelines(&self, stream_ids: &[String]) -> Result<BTreeSet<String>, StorageError>;
}

/// Source of stream records, consumed by the stream cache.
pub trait StreamSource: Send + Sync {
    /// All known streams.
    fn load_streams(&self) -> Result<Vec<StreamRecord>, StorageError>;

    /// A single stream, or `None` if it does not exist.
    fn load_stream(&self, id: &str) -> Result<Option<StreamRecord>, StorageError>;
}
