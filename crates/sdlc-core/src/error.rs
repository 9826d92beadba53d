use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid session id: {id}")]
    InvalidSessionId { id: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}
