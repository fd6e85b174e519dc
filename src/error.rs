//! Errors that can be returned from operations against the cluster api.
//!
//! Only _transport_ problems are represented here. A request that reaches the api server and
//! comes back with a non-2xx status is not an error: it is returned as an `ApiResponse` so that
//! callers can decide for themselves whether a 404 or a 409 matters to them.
use serde_json::Value;

use std::fmt::{self, Display};
use std::time::Duration;

/// Returned when a resource envelope is missing something that an operation needs before any
/// request can be made, for example a named operation on a resource without `metadata.name`.
#[derive(Debug, PartialEq, Clone)]
pub struct InvalidResourceError {
    pub message: &'static str,
    pub value: Value,
}

impl InvalidResourceError {
    pub fn new(message: &'static str, value: Value) -> Self {
        InvalidResourceError { message, value }
    }
}

impl Display for InvalidResourceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Invalid Resource: {}", self.message)
    }
}

impl std::error::Error for InvalidResourceError {}

#[derive(Debug)]
pub enum Error {
    Io(hyper::Error),
    Serde(serde_json::Error),
    Request(http::Error),
    Url(url::ParseError),
    Timeout {
        method: String,
        uri: String,
        after: Duration,
    },
    InvalidResource(InvalidResourceError),
}

impl Error {
    pub fn invalid_resource(message: &'static str, value: Value) -> Error {
        Error::InvalidResource(InvalidResourceError::new(message, value))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e as &(dyn std::error::Error + 'static)),
            Error::Serde(e) => Some(e as &(dyn std::error::Error + 'static)),
            Error::Request(e) => Some(e as &(dyn std::error::Error + 'static)),
            Error::Url(e) => Some(e as &(dyn std::error::Error + 'static)),
            Error::InvalidResource(e) => Some(e as &(dyn std::error::Error + 'static)),
            Error::Timeout { .. } => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref e) => write!(f, "Io Error: {}", e),
            Error::Serde(ref e) => write!(f, "(De)Serialization error: {}", e),
            Error::Request(ref e) => write!(f, "Invalid request: {}", e),
            Error::Url(ref e) => write!(f, "Invalid url: {}", e),
            Error::Timeout {
                ref method,
                ref uri,
                ref after,
            } => write!(
                f,
                "{} request to: {} timed out after {}ms",
                method,
                uri,
                after.as_millis()
            ),
            Error::InvalidResource(ref e) => e.fmt(f),
        }
    }
}

impl From<hyper::Error> for Error {
    fn from(e: hyper::Error) -> Error {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::Serde(e)
    }
}

impl From<http::Error> for Error {
    fn from(e: http::Error) -> Error {
        Error::Request(e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Error {
        Error::Url(e)
    }
}

impl From<InvalidResourceError> for Error {
    fn from(e: InvalidResourceError) -> Error {
        Error::InvalidResource(e)
    }
}
