use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Resource unavailable: {resource}: {reason}")]
    ResourceUnavailable { resource: String, reason: String },

    #[error("Search failed: {0}")]
    SearchFailed(String),
}

impl Error {
    /// Wrap a collaborator failure for `resource`, keeping its full context chain.
    pub fn unavailable(resource: impl Into<String>, err: &anyhow::Error) -> Self {
        Error::ResourceUnavailable { resource: resource.into(), reason: format!("{err:#}") }
    }

    pub fn search_failed(err: &anyhow::Error) -> Self {
        Error::SearchFailed(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
