use sdlc_adapters::AdaptersError;
use sdlc_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("stack info is missing a base URL (expected one of apiUrl, baseUrl, endpoint)")]
    MissingBaseUrl,

    #[error("AI response did not contain a JSON object: {0}")]
    MissingJsonObject(String),

    #[error("AI response did not match the expected shape: {0}")]
    ShapeMismatch(String),

    #[error(transparent)]
    Adapter(#[from] AdaptersError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl VerifyError {
    pub fn terminal(&self) -> (String, String) {
        ("verification failed".to_string(), self.to_string())
    }
}
