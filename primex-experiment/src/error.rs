use thiserror::Error;

/// Failures surfaced by the experiment engine. None of them is retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Malformed or contradictory parameters; raised before any trial plays.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A gateway save or query failed. Results stay available locally.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    /// A shared-link token could not be turned back into a configuration.
    #[error("could not decode shared configuration: {0}")]
    DecodeFailure(String),

    #[error("export failed: {0}")]
    Export(String),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidConfiguration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
