use thiserror::Error;

/// Errors raised while classifying or validating a content hash string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("invalid hash: {0}")]
    InvalidHash(String),
}

/// Error taxonomy for content resolution.
///
/// `InvalidContent` and `InvalidArgument` are fatal for the record being
/// processed; `ContentCurrentlyUnavailable` and `TransientIo` are retriable
/// by the caller (the pending-work pipeline simply leaves the record in
/// place for the next sweep).
#[derive(Error, Debug)]
pub enum ContentError {
    #[error("invalid content: {0}")]
    InvalidContent(String),

    #[error("content currently unavailable: {0}")]
    ContentCurrentlyUnavailable(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("transient I/O error: {0}")]
    TransientIo(String),
}

impl From<HashError> for ContentError {
    fn from(error: HashError) -> Self {
        ContentError::InvalidArgument(format!("{}", error))
    }
}

/// Errors a `ChainVerifier` may signal. `InvalidArgument` is caught by
/// `check_message` and turned into a plain rejection; any other variant
/// propagates to the caller of `check_message`.
#[derive(Error, Debug)]
pub enum VerifierError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("verifier error: {0}")]
    Other(String),
}

/// Crate-wide aggregate error, used at the job/supervisor boundary where
/// several component errors can surface together.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("hash error: {0}")]
    Hash(#[from] HashError),

    #[error("content error: {0}")]
    Content(#[from] ContentError),

    #[error("verifier error: {0}")]
    Verifier(#[from] VerifierError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
