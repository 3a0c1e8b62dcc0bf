use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Geocoder unavailable: {0}")]
    GeocodeUnavailable(String),

    #[error("Embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Answer synthesis unavailable: {0}")]
    SynthesisUnavailable(String),

    #[error("Dataset index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Query cancelled")]
    Cancelled,
}

/// Discriminant of [`Error`] for callers that branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    GeocodeUnavailable,
    EmbeddingUnavailable,
    SynthesisUnavailable,
    IndexUnavailable,
    InvalidConfig,
    Cancelled,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::GeocodeUnavailable(_) => ErrorKind::GeocodeUnavailable,
            Error::EmbeddingUnavailable(_) => ErrorKind::EmbeddingUnavailable,
            Error::SynthesisUnavailable(_) => ErrorKind::SynthesisUnavailable,
            Error::IndexUnavailable(_) => ErrorKind::IndexUnavailable,
            Error::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
