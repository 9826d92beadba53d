use thiserror::Error;

/// Errors raised by the external-SDK boundary crate. Workers translate
/// these into the typed, worker-specific error kinds of spec.md §7 — this
/// enum only needs to distinguish "transient, worth retrying" from
/// everything else (spec.md §7 transient-external row).
#[derive(Debug, Error)]
pub enum AdaptersError {
    #[error("transient failure calling {what}: {source}")]
    Transient { what: String, source: Box<dyn std::error::Error + Send + Sync> },

    #[error("{what}: {message}")]
    Permanent { what: String, message: String },

    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdaptersError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AdaptersError::Transient { .. })
    }

    pub fn transient(what: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        AdaptersError::Transient { what: what.into(), source: Box::new(source) }
    }

    pub fn permanent(what: impl Into<String>, message: impl Into<String>) -> Self {
        AdaptersError::Permanent { what: what.into(), message: message.into() }
    }
}
