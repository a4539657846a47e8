//! Error types.
//!
//! Configuration and pagination errors are fatal and bubble up to `main`.
//! Probe, validation and state-change errors are contained per course and
//! only show up as log lines and status fields in the output.

use thiserror::Error;

/// Problems with the process configuration, detected before any network call.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required credential was not supplied.
    #[error("missing credential: {0} (set it in the environment or .env)")]
    MissingCredential(&'static str),

    /// The base API URL could not be used.
    #[error("invalid base API URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// Errors talking to the Canvas REST API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request could not be sent or the response body could not be read.
    #[error("request failed: {0}")]
    Transport(String),

    /// Request exceeded the configured timeout.
    #[error("request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    /// Server answered with a non-success status.
    #[error("request to {url} failed with status {status}")]
    Status { status: u16, url: String },

    /// The `Link` header had a `rel="next"` entry we could not read.
    #[error("invalid Link header entry: {0}")]
    MalformedLink(String),

    /// Response body did not match the expected shape.
    #[error("failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// A course that cannot be checked against the filter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// SIS id is missing or does not have exactly four dash-separated segments.
    #[error("invalid course SIS id: '{0}'")]
    MalformedSisId(String),
}
