use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("session not found: {session_id}")]
    NotFound { session_id: String },

    #[error("artifact not found: {key}")]
    ArtifactNotFound { key: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
