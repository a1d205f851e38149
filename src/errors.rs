use std::io;

use thiserror::Error;

use crate::types::{FormId, SemaphoreName};

/// Error type for fetch, parse, configuration, and form failures.
#[derive(Debug, Error)]
pub enum PageError {
    /// The fetcher could not complete the request.
    #[error("request to '{url}' failed: {reason}")]
    Http { url: String, reason: String },
    /// The response body did not parse as JSON.
    #[error("response from '{url}' is not valid JSON: {reason}")]
    MalformedJson { url: String, reason: String },
    /// Invalid settings or arguments.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Form inputs do not match the schema.
    #[error("form '{form_id}' is invalid: {details}")]
    Form { form_id: FormId, details: String },
    /// Underlying IO failure.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// A newer batch under the same semaphore replaced this one.
    #[error("batch under semaphore '{semaphore}' was superseded by a newer batch")]
    Superseded { semaphore: SemaphoreName },
    /// The batch was cancelled through its handle.
    #[error("batch was cancelled before completing")]
    Cancelled,
}
