use std::io;
use thiserror::Error;

/// Errors that can occur when working with a hash database file
#[derive(Error, Debug)]
pub enum Error {
    /// Zero sizes or counts, empty paths, oversized keys or values
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// IO errors when creating, opening, mapping or removing the file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The free list is exhausted
    #[error("No free slots left")]
    OutOfSpace,

    /// Key not found in the table
    #[error("Key not found")]
    NotFound,

    /// The handle geometry is inconsistent
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The file contents do not describe a valid table
    #[error("Corrupted file: {0}")]
    Corrupted(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }

    pub fn is_out_of_space(&self) -> bool {
        matches!(self, Error::OutOfSpace)
    }

    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    pub(crate) fn corrupted(msg: impl Into<String>) -> Self {
        Error::Corrupted(msg.into())
    }
}
