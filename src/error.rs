//! Error taxonomy surfaced by the filesystem core (see the Backend and
//! filesystem-core contracts).

use thiserror::Error;

use crate::backend::BackendError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors the filesystem core can raise. Every variant maps to exactly one
/// kernel errno in [`crate::fuse_adapter`].
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend returned no-such-key on a required read.
    #[error("no such file or directory")]
    NotFound,
    /// `Create`/`Mkdir`/`Symlink` found an existing object at the target path.
    #[error("file already exists")]
    AlreadyExists,
    /// `Opendir`/`Rmdir` was invoked on a non-directory.
    #[error("not a directory")]
    NotADirectory,
    /// `Rmdir` on a directory that still has entries other than `.keep`.
    #[error("directory not empty")]
    NotEmpty,
    /// `Link`, `Mknod`: unconditionally unsupported.
    #[error("operation not supported")]
    NotSupported,
    /// Backend reported a transient or fatal failure we cannot classify
    /// more precisely.
    #[error("I/O error")]
    IO,
}

impl Error {
    /// Classify a [`BackendError`] into the taxonomy the filesystem core
    /// exposes to callers. Only [`BackendError::Transient`] ever warrants a
    /// caller-side retry, and retrying is the caller's decision, not ours.
    pub fn classify(err: BackendError) -> Self {
        match err {
            BackendError::NotFound => Error::NotFound,
            BackendError::Conflict => Error::AlreadyExists,
            BackendError::Transient | BackendError::Fatal => Error::IO,
        }
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        Error::classify(err)
    }
}
