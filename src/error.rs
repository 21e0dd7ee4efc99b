use std::path::PathBuf;

use thiserror::Error;

use crate::location::SourceLocation;

/// The six error kinds a program run can surface, plus the non-fatal
/// warning path used for conditions execution survives.
#[derive(Debug, Error)]
pub enum OrganicError {
    #[error("argument error: {0}")]
    Argument(String),

    #[error("file error: {path}: {message}")]
    File { path: PathBuf, message: String },

    #[error("{location}: parse error: {message}")]
    Parse {
        location: SourceLocation,
        message: String,
    },

    #[error("{location}: include error: {message}")]
    Include {
        location: SourceLocation,
        message: String,
    },

    #[error("machine error: {0}")]
    Machine(String),
}

pub type OrganicResult<T> = Result<T, OrganicError>;

impl OrganicError {
    pub fn parse(location: SourceLocation, message: impl Into<String>) -> Self {
        OrganicError::Parse {
            location,
            message: message.into(),
        }
    }

    pub fn include(location: SourceLocation, message: impl Into<String>) -> Self {
        OrganicError::Include {
            location,
            message: message.into(),
        }
    }

    pub fn file(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        OrganicError::File {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn machine(message: impl Into<String>) -> Self {
        OrganicError::Machine(message.into())
    }
}

/// Non-fatal conditions: execution continues, but the caller may want to
/// surface them (the CLI logs them at `warn`).
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub location: SourceLocation,
    pub message: String,
}

impl Diagnostic {
    pub fn new(location: SourceLocation, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: warning: {}", self.location, self.message)
    }
}
