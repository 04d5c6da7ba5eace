use hyper::header::InvalidHeaderValue;
use hyper::http::uri::InvalidUri;
use hyper::StatusCode;
use std::fmt::Display;
use tracing::debug;

use crate::oci;

#[derive(Debug, PartialEq)]
pub enum Error {
    Unauthorized(String),
    Denied(String),
    UnexpectedStatus { status: StatusCode, location: String },
    InvalidResponse(String),
    Internal(String),
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Unauthorized(s) => write!(f, "unauthorized: {s}"),
            Error::Denied(s) => write!(f, "requested access to the resource is denied: {s}"),
            Error::UnexpectedStatus { status, location } => {
                write!(f, "unexpected status {status} from {location}")
            }
            Error::InvalidResponse(s) => write!(f, "invalid registry response: {s}"),
            Error::Internal(s) => write!(f, "internal error: {s}"),
        }
    }
}

impl From<oci::Error> for Error {
    fn from(error: oci::Error) -> Self {
        Error::InvalidResponse(error.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        debug!("I/O error: {error:?}");
        Error::Internal(format!("I/O error: {error}"))
    }
}

impl From<hyper::Error> for Error {
    fn from(error: hyper::Error) -> Self {
        debug!("Hyper error: {error:?}");
        Error::Internal(format!("HTTP error: {error}"))
    }
}

impl From<hyper::http::Error> for Error {
    fn from(error: hyper::http::Error) -> Self {
        debug!("Hyper HTTP error: {error:?}");
        Error::Internal(format!("HTTP error: {error}"))
    }
}

impl From<InvalidHeaderValue> for Error {
    fn from(error: InvalidHeaderValue) -> Self {
        Error::Internal(format!("Invalid header value: {error}"))
    }
}

impl From<InvalidUri> for Error {
    fn from(error: InvalidUri) -> Self {
        Error::Internal(format!("Invalid URI: {error}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        debug!("Serde JSON error: {error:?}");
        Error::InvalidResponse(error.to_string())
    }
}

impl From<serde_urlencoded::ser::Error> for Error {
    fn from(error: serde_urlencoded::ser::Error) -> Self {
        Error::Internal(format!("Query string encoding error: {error}"))
    }
}
