use std::time::Duration;
use thiserror::Error;

use crate::validation::ValidationError;

/// Errors raised while setting up a run. Once a `Checker` exists nothing
/// escalates past it; every per-case problem ends up in a verdict.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(#[from] ValidationError),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),

    #[error("Request timeout must be greater than zero")]
    ZeroTimeout,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaseError {
    #[error("path placeholder `{placeholder}` of {endpoint} is not bound")]
    UnboundPlaceholder {
        endpoint: &'static str,
        placeholder: String,
    },

    #[error("`{param}` is not a path placeholder of {endpoint}")]
    UnknownPathParam {
        endpoint: &'static str,
        param: String,
    },

    #[error("query parameter `{key}` is not accepted by {endpoint}")]
    UnknownQueryParam { endpoint: &'static str, key: String },

    #[error("body field `{field}` is not accepted by {endpoint}")]
    UnknownBodyField {
        endpoint: &'static str,
        field: String,
    },

    #[error("{0} does not take a request body")]
    UnexpectedBody(&'static str),

    #[error("request body for {0} must be a JSON object")]
    BodyNotObject(&'static str),
}

/// Why a prepared case could not be turned into a request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrepareError {
    #[error("needs capture `{0}`, which no earlier case produced")]
    MissingCapture(String),

    #[error("could not build request URL: {0}")]
    InvalidUrl(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Other(String),
}
