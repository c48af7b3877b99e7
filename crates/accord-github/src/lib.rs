pub mod backend;
pub mod config;
pub mod error;
pub mod github;

pub use backend::{
    CheckState, ListQuery, MergeState, RepoBackend, RequestState, Review, ReviewKind,
    ReviewRequest, ReviewSubmission, ReviewVerdict, RfcContents,
};
pub use config::GitHubConfig;
pub use error::BackendError;
pub use github::GitHubBackend;
