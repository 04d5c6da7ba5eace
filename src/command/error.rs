use crate::command::clean;
use crate::{configuration, registry};
use std::fmt;

#[derive(Debug)]
pub enum Error {
    Configuration(configuration::Error),
    Registry(registry::Error),
    Clean(clean::Error),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Configuration(err) => write!(f, "Configuration error: {err}"),
            Error::Registry(err) => write!(f, "Registry error: {err}"),
            Error::Clean(err) => write!(f, "Clean error: {err}"),
        }
    }
}

impl From<configuration::Error> for Error {
    fn from(err: configuration::Error) -> Self {
        Error::Configuration(err)
    }
}

impl From<registry::Error> for Error {
    fn from(err: registry::Error) -> Self {
        Error::Registry(err)
    }
}

impl From<clean::Error> for Error {
    fn from(err: clean::Error) -> Self {
        match err {
            clean::Error::Registry(err) => Error::Registry(err),
            err => Error::Clean(err),
        }
    }
}
