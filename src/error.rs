//! Error types shared by the analysis pipeline.

use std::time::Duration;
use thiserror::Error;

/// Failure while retrieving the metadata of a single message.
///
/// The fan-out retriever inspects these per item and decides, according to
/// its [`FailurePolicy`](crate::analysis::FailurePolicy), whether the whole
/// batch is lost or only the offending message.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The store could not be reached or answered with an error.
    #[error("transport error: {0}")]
    Transport(String),
    /// The fetch did not complete within the configured delay.
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
    /// The identifier is unknown to the store.
    #[error("message {0} not found")]
    NotFound(String),
    /// The store answered but the payload could not be interpreted.
    #[error("malformed message: {0}")]
    Malformed(String),
}

/// Reason a pipeline run could not produce an analysis.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("authentication failed: {0}")]
    Credential(String),
    #[error("unable to list messages: {0}")]
    Listing(String),
    #[error("message {id} could not be fetched: {source}")]
    Fetch {
        id: String,
        #[source]
        source: FetchError,
    },
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;
