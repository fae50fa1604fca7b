//! In-memory definition store.
//!
//! Backs tests and embedded deployments. Every read returns a copy, so a
//! caller never observes a half-applied write.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use parking_lot::RwLock;

use crate::error::StorageError;
use crate::record::{
    DefinitionBundle, PipelineConnections, PipelineDefinition, RuleDefinition, StreamRecord,
};
use crate::traits::{ConnectionResolver, DefinitionSource, StreamSource};

#[derive(Debug, Default)]
struct Inner {
    rules: BTreeMap<String, RuleDefinition>,
    pipelines: BTreeMap<String, PipelineDefinition>,
    connections: BTreeMap<String, BTreeSet<String>>,
    streams: BTreeMap<String, StreamRecord>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bundle(bundle: DefinitionBundle) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.write();
            for rule in bundle.rules {
                inner.rules.insert(rule.id.clone(), rule);
            }
            for pipeline in bundle.pipelines {
                inner.pipelines.insert(pipeline.id.clone(), pipeline);
            }
            for conn in bundle.connections {
                inner.connections.insert(conn.stream_id, conn.pipeline_ids);
            }
            for stream in bundle.streams {
                inner.streams.insert(stream.id.clone(), stream);
            }
        }
        store
    }

    /// Decode a JSON [`DefinitionBundle`].
    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        let bundle: DefinitionBundle = serde_json::from_str(json)?;
        Ok(Self::from_bundle(bundle))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, StorageError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StorageError::Backend(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// Current contents as a bundle.
    pub fn to_bundle(&self) -> DefinitionBundle {
        let inner = self.inner.read();
        DefinitionBundle {
            rules: inner.rules.values().cloned().collect(),
            pipelines: inner.pipelines.values().cloned().collect(),
            connections: inner
                .connections
                .iter()
                .map(|(stream_id, ids)| PipelineConnections {
                    stream_id: stream_id.clone(),
                    pipeline_ids: ids.clone(),
                })
                .collect(),
            streams: inner.streams.values().cloned().collect(),
        }
    }

    // ── Writes ───────────────────────────────────────────────────────────

    /// Insert or replace a rule.
    pub fn save_rule(&self, rule: RuleDefinition) {
        self.inner.write().rules.insert(rule.id.clone(), rule);
    }

    pub fn delete_rule(&self, id: &str) -> Result<RuleDefinition, StorageError> {
        self.inner
            .write()
            .rules
            .remove(id)
            .ok_or_else(|| StorageError::RuleNotFound { id: id.to_string() })
    }

    /// Insert or replace a pipeline.
    pub fn save_pipeline(&self, pipeline: PipelineDefinition) {
        self.inner
            .write()
            .pipelines
            .insert(pipeline.id.clone(), pipeline);
    }

    /// Remove a pipeline together with every connection to it.
    pub fn delete_pipeline(&self, id: &str) -> Result<PipelineDefinition, StorageError> {
        let mut inner = self.inner.write();
        let removed = inner
            .pipelines
            .remove(id)
            .ok_or_else(|| StorageError::PipelineNotFound { id: id.to_string() })?;
        for ids in inner.connections.values_mut() {
            ids.remove(id);
        }
        Ok(removed)
    }

    /// Replace the set of pipelines connected to a stream.
    pub fn connect(&self, stream_id: &str, pipeline_ids: impl IntoIterator<Item = String>) {
        self.inner
            .write()
            .connections
            .insert(stream_id.to_string(), pipeline_ids.into_iter().collect());
    }

    pub fn save_stream(&self, stream: StreamRecord) {
        self.inner.write().streams.insert(stream.id.clone(), stream);
    }

    pub fn delete_stream(&self, id: &str) -> Result<StreamRecord, StorageError> {
        let mut inner = self.inner.write();
        let removed = inner
            .streams
            .remove(id)
            .ok_or_else(|| StorageError::StreamNotFound { id: id.to_string() })?;
        inner.connections.remove(id);
        Ok(removed)
    }
}

impl DefinitionSource for InMemoryStore {
    fn load_rules(&self) -> Result<Vec<RuleDefinition>, StorageError> {
        Ok(self.inner.read().rules.values().cloned().collect())
    }

    fn load_pipelines(&self) -> Result<Vec<PipelineDefinition>, StorageError> {
        Ok(self.inner.read().pipelines.values().cloned().collect())
    }
}

impl ConnectionResolver for InMemoryStore {
    fn resolve_pipelines(&self, stream_ids: &[String]) -> Result<BTreeSet<String>, StorageError> {
        let inner = self.inner.read();
        Ok(stream_ids
            .iter()
            .filter_map(|id| inner.connections.get(id))
            .flatten()
            .cloned()
            .collect())
    }
}

impl StreamSource for InMemoryStore {
    fn load_streams(&self) -> Result<Vec<StreamRecord>, StorageError> {
        Ok(self.inner.read().streams.values().cloned().collect())
    }

    fn load_stream(&self, id: &str) -> Result<Option<StreamRecord>, StorageError> {
        Ok(self.inner.read().streams.get(id).cloned())
    }
}
