use thiserror::Error;

/// Storage-layer failure vocabulary shared by every repository trait.
///
/// `Unavailable` is the only retryable variant: it covers pool exhaustion,
/// lost connections and timeouts, and surfaces to callers as a transient
/// (HTTP 500) failure. `NotFound` and `Conflict` are terminal.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("conflicting record already exists: {0}")]
    Conflict(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// True when the caller may retry the same operation verbatim.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}
