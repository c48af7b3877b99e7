use crate::error::BackendError;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_BASE_BRANCH: &str = "main";

/// Connection settings for one GitHub identity against the tracking
/// repository. The service runs with two of these: the acting user's token
/// and a machine token for admin work (loads, merges, status reads).
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub api_base: String,
    pub owner: String,
    pub repo: String,
    pub base_branch: String,
    pub token: String,
}

impl GitHubConfig {
    /// Build a config from the environment, reading the token from the given
    /// variable (e.g. `GITHUB_TOKEN` or `GITHUB_MACHINE_TOKEN`).
    ///
    /// `TRACKING_OWNER` and `TRACKING_REPOSITORY` are required;
    /// `BASE_BRANCH` and `GITHUB_API_BASE` fall back to defaults.
    pub fn from_env(token_var: &str) -> Result<Self, BackendError> {
        let required = |var: &str| {
            std::env::var(var).map_err(|_| BackendError::Config(format!("{var} is not set")))
        };

        Ok(Self {
            api_base: std::env::var("GITHUB_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            owner: required("TRACKING_OWNER")?,
            repo: required("TRACKING_REPOSITORY")?,
            base_branch: std::env::var("BASE_BRANCH")
                .unwrap_or_else(|_| DEFAULT_BASE_BRANCH.to_string()),
            token: required(token_var)?,
        })
    }
}
