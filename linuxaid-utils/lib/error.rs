//! `linuxaid_utils::error` is a module containing error utilities for the linuxaid project.

use std::{
    error::Error,
    fmt::{self, Display},
    path::PathBuf,
};

use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a linuxaid-utils operation.
pub type UtilsResult<T> = Result<T, UtilsError>;

/// An error that occurred in one of the host utilities.
#[derive(pretty_error_debug::Debug, Error)]
pub enum UtilsError {
    /// An external command could not be started.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        /// The command line that failed to start.
        command: String,

        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An environment file could not be parsed.
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        /// The file that was being read.
        path: PathBuf,

        /// The parser error.
        source: dotenvy::Error,
    },

    /// An error that occurred when performing an IO operation
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// Custom error.
    #[error("Custom error: {0}")]
    Custom(#[from] AnyError),
}

/// An error that can represent any error.
#[derive(Debug)]
pub struct AnyError {
    error: anyhow::Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl UtilsError {
    /// Creates a new `Err` result.
    pub fn custom(error: impl Into<anyhow::Error>) -> UtilsError {
        UtilsError::Custom(AnyError {
            error: error.into(),
        })
    }
}

impl AnyError {
    /// Downcasts the error to a `T`.
    pub fn downcast<T>(&self) -> Option<&T>
    where
        T: Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.downcast_ref::<T>()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Creates an `Ok` `UtilsResult`.
#[allow(non_snake_case)]
pub fn Ok<T>(value: T) -> UtilsResult<T> {
    Result::Ok(value)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl PartialEq for AnyError {
    fn eq(&self, other: &Self) -> bool {
        self.error.to_string() == other.error.to_string()
    }
}

impl Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Error for AnyError {}
