use crate::delta::Delta;
use std::error::Error;
use std::io;
use thiserror::Error;

/// An error related to store operations (reads, writes...).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Error from the OS I/O layer.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Error related to data corruption.
    #[error(transparent)]
    Corruption(#[from] CorruptionError),
    /// The operation was cancelled or timed out.
    ///
    /// Distinguishable from I/O failures so that callers can retry.
    #[error("the operation was cancelled")]
    Cancelled,
    /// A database already exists at the target location.
    #[error("quadstore: cannot init; database already exists")]
    DatabaseExists,
    /// The target location holds no initialized database.
    #[error("quadstore: database not initialized")]
    DatabaseNotInitialized,
    /// API misuse. Fatal and never retryable.
    #[error("{0}")]
    Misuse(String),
    #[doc(hidden)]
    #[error("{0}")]
    Other(#[source] Box<dyn Error + Send + Sync + 'static>),
}

impl StoreError {
    /// Builds the error raised on API misuse (calling `next` on an optional
    /// cursor, negative paging bounds, a ref from another store...).
    pub fn misuse(msg: impl Into<String>) -> Self {
        Self::Misuse(msg.into())
    }

    /// Whether retrying the failed operation can ever succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io(_) | Self::Cancelled => true,
            Self::Corruption(_)
            | Self::DatabaseExists
            | Self::DatabaseNotInitialized
            | Self::Misuse(_)
            | Self::Other(_) => false,
        }
    }
}

impl From<StoreError> for io::Error {
    #[inline]
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Io(error) => error,
            StoreError::Corruption(error) => error.into(),
            StoreError::Cancelled => Self::new(io::ErrorKind::Interrupted, error.to_string()),
            StoreError::Misuse(_) => Self::new(io::ErrorKind::InvalidInput, error.to_string()),
            StoreError::DatabaseExists | StoreError::DatabaseNotInitialized => {
                Self::new(io::ErrorKind::Other, error.to_string())
            }
            StoreError::Other(error) => Self::new(io::ErrorKind::Other, error),
        }
    }
}

/// An error returned if some content in the database is corrupted.
#[derive(Debug, Error)]
pub enum CorruptionError {
    #[error("{0}")]
    Msg(String),
    #[error("{0}")]
    Other(#[source] Box<dyn Error + Send + Sync + 'static>),
}

impl CorruptionError {
    /// Builds an error from a printable error message.
    #[inline]
    pub(crate) fn msg(msg: impl Into<String>) -> Self {
        Self::Msg(msg.into())
    }
}

impl From<CorruptionError> for io::Error {
    #[inline]
    fn from(error: CorruptionError) -> Self {
        Self::new(io::ErrorKind::InvalidData, error)
    }
}

/// An error raised while applying a batch of deltas.
///
/// Conflicts carry the offending [`Delta`] so that the caller can see which
/// one failed; the whole batch is rejected in that case.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeltaError {
    /// An added quad is already present and
    /// [`IgnoreOpts::ignore_dup`](crate::IgnoreOpts) is not set.
    #[error("quad exists: {0}")]
    QuadExists(Delta),
    /// A deleted quad is absent and
    /// [`IgnoreOpts::ignore_missing`](crate::IgnoreOpts) is not set.
    #[error("quad does not exist: {0}")]
    QuadNotExist(Delta),
    /// The delta carries an unknown action token.
    #[error("invalid action: {0}")]
    InvalidAction(String),
    /// The backend failed while applying the batch.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl DeltaError {
    /// The delta the batch was rejected on, if the error is a conflict.
    pub fn delta(&self) -> Option<&Delta> {
        match self {
            Self::QuadExists(d) | Self::QuadNotExist(d) => Some(d),
            Self::InvalidAction(_) | Self::Storage(_) => None,
        }
    }
}
