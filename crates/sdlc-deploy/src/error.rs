use sdlc_adapters::AdaptersError;
use sdlc_storage::StorageError;
use thiserror::Error;

/// Typed deploy-worker errors, shaped so the top-level handler maps each
/// variant onto a §7 error kind without string-sniffing.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("sub-path {sub_path} does not resolve to a directory in the cloned repository")]
    SubPathNotFound { sub_path: String },

    #[error("{iac_kind} deployments require external CLI tools and are not supported")]
    UnsupportedIac { iac_kind: String },

    #[error("package integrity error: {0}")]
    PackageIntegrity(String),

    #[error("provisioning failed: {0}")]
    Provisioning(String),

    #[error("provisioning timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error(transparent)]
    Adapter(#[from] AdaptersError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DeployError {
    /// `(message, error)` pair written into the session's terminal event
    /// (spec.md §7 "every session ends with ... a short human-readable
    /// message and ... a non-empty error").
    pub fn terminal(&self) -> (String, String) {
        ("deployment failed".to_string(), self.to_string())
    }
}
