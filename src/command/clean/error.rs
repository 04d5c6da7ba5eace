use std::fmt;

use crate::{configuration, registry};

#[derive(Debug, PartialEq)]
pub enum Error {
    IncompatibleExclusions,
    UnsupportedAction(String),
    InvalidExclusion(String),
    InvalidRepositoryPattern(String),
    Initialization(String),
    Registry(registry::Error),
    Execution(String),
    Incomplete { failed: usize },
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::IncompatibleExclusions => write!(
                f,
                "exclusions cannot be combined with the delete action, which removes whole repositories"
            ),
            Error::UnsupportedAction(action) => write!(f, "unsupported action '{action}'"),
            Error::InvalidExclusion(exclusion) => write!(
                f,
                "invalid exclusion '{exclusion}', expected 'repository@digest' or 'repository:tag'"
            ),
            Error::InvalidRepositoryPattern(pattern) => {
                write!(f, "invalid repository pattern '{pattern}'")
            }
            Error::Initialization(err) | Error::Execution(err) => write!(f, "{err}"),
            Error::Registry(err) => write!(f, "registry error: {err}"),
            Error::Incomplete { failed } => {
                write!(f, "{failed} repository(ies) could not be processed")
            }
        }
    }
}

impl From<registry::Error> for Error {
    fn from(err: registry::Error) -> Self {
        Error::Registry(err)
    }
}

impl From<configuration::Error> for Error {
    fn from(err: configuration::Error) -> Self {
        Error::Initialization(err.to_string())
    }
}
