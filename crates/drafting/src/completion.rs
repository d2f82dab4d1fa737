//! The chat-completion port.
//!
//! Infrastructure crates implement [`ChatCompletion`]; the drafting domain
//! only ever sees a system instruction going out and a single text
//! completion coming back. Authentication and transport stay behind the
//! trait.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::errors::RetryPolicy;

/// One single-turn completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System instruction describing the task and output contract.
    pub system: String,
    /// User content (the notes, plus any assembled context).
    pub user: String,
    /// Sampling temperature. Lower is more deterministic.
    pub temperature: f32,
    /// Ask the provider to constrain output to a JSON object.
    pub json_object: bool,
}

/// Failures reported by a [`ChatCompletion`] implementation.
///
/// Variants are coarse on purpose: the domain only needs enough to decide
/// the [`RetryPolicy`]; detail lives in the message fields.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// No bearer token could be obtained, or the provider rejected it.
    #[error("authentication failed: {message}")]
    Authentication {
        /// Description of the credential or authorisation failure.
        message: String,
    },

    /// The request did not complete (connection failure, timeout).
    #[error("transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// The provider throttled the request.
    #[error("rate limited by completion provider")]
    RateLimited {
        /// Delay requested by the provider, when it sent one.
        retry_after: Option<Duration>,
    },

    /// The provider answered with a non-success status.
    #[error("completion request rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnosis.
        body: String,
    },

    /// The provider answered, but not in the expected envelope.
    #[error("malformed completion response: {message}")]
    MalformedResponse {
        /// Description of the decoding failure.
        message: String,
    },
}

impl CompletionError {
    /// Advises the caller whether repeating the request may succeed.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            CompletionError::Transport { .. } => RetryPolicy::Retryable { after: None },
            CompletionError::RateLimited { retry_after } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            CompletionError::Rejected { status, .. } if *status >= 500 => {
                RetryPolicy::Retryable { after: None }
            }
            CompletionError::Authentication { .. }
            | CompletionError::Rejected { .. }
            | CompletionError::MalformedResponse { .. } => RetryPolicy::NonRetryable,
        }
    }
}

/// A hosted model able to answer one system + user exchange with text.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Performs a single completion and returns the raw text of the first choice.
    ///
    /// An empty string is a valid answer; interpreting it is the caller's job.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}
