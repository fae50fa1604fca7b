pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::InMemoryStore;
pub use record::{
    DefinitionBundle, PipelineConnections, PipelineDefinition, RuleDefinition, StageDefinition,
    StageMatch, StreamRecord, DEFAULT_STREAM_ID,
};
pub use traits::{ConnectionResolver, DefinitionSource, StreamSource};
