use crate::report::VerificationFailure;
use hyper::http;
use std::{fmt::Display, io, sync};

#[derive(Debug)]
pub enum Error {
    Registration(String),
    Startup(String),
    Shutdown(String),
    UnverifiedInteractions(VerificationFailure),
    ProviderVerification(VerificationFailure),
    ContractFormat(String),
    InvalidRegex(regex::Error),
    Json(serde_json::Error),
    PoisonedLock,
    InvalidHeaderName,
    InvalidHeaderValue,
    HyperError(hyper::Error),
    HttpError(http::Error),
    IoError(io::Error),
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Registration(reason) => write!(f, "Invalid interaction: {}", reason),
            Error::Startup(reason) => write!(f, "The mock server could not start: {}", reason),
            Error::Shutdown(reason) => write!(f, "The mock server could not stop: {}", reason),
            Error::UnverifiedInteractions(failure) => {
                write!(f, "Pact verification failed:\n{}", failure)
            }
            Error::ProviderVerification(failure) => {
                write!(f, "Provider verification failed:\n{}", failure)
            }
            Error::ContractFormat(reason) => write!(f, "Invalid contract document: {}", reason),
            Error::InvalidRegex(e) => write!(f, "Invalid regex matcher: {}", e),
            Error::Json(e) => write!(f, "JSON error: {}", e),
            Error::PoisonedLock => write!(f, "The lock was poisoned"),
            Error::InvalidHeaderName => write!(f, "Invalid header name"),
            Error::InvalidHeaderValue => write!(f, "Invalid header value"),
            Error::HyperError(e) => write!(f, "Hyper error: {}", e),
            Error::HttpError(e) => write!(f, "Http error: {}", e),
            Error::IoError(e) => write!(f, "IoError: {}", e),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::IoError(e)
    }
}

impl<T> From<sync::PoisonError<T>> for Error {
    fn from(_: sync::PoisonError<T>) -> Self {
        Error::PoisonedLock
    }
}

impl From<regex::Error> for Error {
    fn from(e: regex::Error) -> Self {
        Error::InvalidRegex(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<hyper::header::InvalidHeaderName> for Error {
    fn from(_: hyper::header::InvalidHeaderName) -> Self {
        Error::InvalidHeaderName
    }
}

impl From<hyper::header::InvalidHeaderValue> for Error {
    fn from(_: hyper::header::InvalidHeaderValue) -> Self {
        Error::InvalidHeaderValue
    }
}

impl From<hyper::Error> for Error {
    fn from(e: hyper::Error) -> Self {
        Error::HyperError(e)
    }
}

impl From<http::Error> for Error {
    fn from(e: http::Error) -> Self {
        Error::HttpError(e)
    }
}
