/// All errors that can be returned by a definition or stream source.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No rule with the given id.
    #[error("rule not found: {id}")]
    RuleNotFound { id: String },

    /// No pipeline with the given id.
    #[error("pipeline not found: {id}")]
    PipelineNotFound { id: String },

    /// No stream with the given id.
    #[error("stream not found: {id}")]
    StreamNotFound { id: String },

    /// A definition bundle could not be decoded.
    #[error("invalid definition bundle: {0}")]
    Decode(#[from] serde_json::Error),

    /// A backend-specific storage error (connection, permissions, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
