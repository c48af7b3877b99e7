use thiserror::Error;

use crate::loader::LoadError;

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Client error; rejected before any backend side effect.
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("backend error: {0}")]
    Backend(#[from] accord_github::BackendError),
    #[error("ledger error: {0}")]
    Core(#[from] accord_core::CoreError),
    #[error("stored artifact for RFC {identifier} is not a valid RFC: {source}")]
    MalformedArtifact {
        identifier: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unable to determine mergeability of RFC {0}")]
    MergeabilityUndetermined(String),
    #[error("RFC {0} was loaded but could not be merged")]
    LoadedButNotMerged(String),
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl WorkflowError {
    /// True for errors the caller can fix by changing the request.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
