use sdlc_adapters::AdaptersError;
use sdlc_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepairError {
    #[error("AI plan reply did not contain a JSON object: {0}")]
    MissingPlanObject(String),

    #[error("AI plan reply did not match the expected shape: {0}")]
    PlanShapeMismatch(String),

    #[error("AI rewrite reply did not match the expected shape: {0}")]
    RewriteShapeMismatch(String),

    #[error("push to origin failed: {0}")]
    PushDenied(String),

    #[error(transparent)]
    Adapter(#[from] AdaptersError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RepairError {
    pub fn terminal(&self) -> (String, String) {
        ("repair failed".to_string(), self.to_string())
    }
}
