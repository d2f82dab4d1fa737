//! Error and retry-policy types for the drafting domain.
//!
//! [`AssistantError`] is what callers of [`crate::WorkItemAssistant`] see.
//! Completion-level failures are defined next to the port in
//! [`crate::completion`] and wrapped here without translation.
//!
//! [`RetryPolicy`] is advisory: nothing in this workspace retries on its own,
//! but every error can tell the caller whether a retry is worth attempting.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::completion::CompletionError;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// - `Retryable` errors: transport timeouts, rate-limit responses.
/// - `NonRetryable` errors: missing configuration, rejected credentials,
///   unusable model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means retry
        /// immediately or apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried automatically.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Model output
// ---------------------------------------------------------------------------

/// The model answered, but its output cannot be turned into a draft.
///
/// Only the draft path produces this; the gate path degrades to a fixed
/// fallback result instead. The raw text is kept for operator diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unusable model output: {reason}. Raw: {raw}")]
pub struct ModelOutputError {
    /// What was wrong with the output.
    pub reason: String,
    /// The completion text exactly as the model returned it.
    pub raw: String,
}

impl ModelOutputError {
    pub(crate) fn new(reason: impl Into<String>, raw: &str) -> Self {
        Self {
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Assistant errors
// ---------------------------------------------------------------------------

/// Errors surfaced by the gate and draft operations.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// Required configuration is absent or invalid.
    ///
    /// Produced before any network activity; never retried.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// The draft path could not use the model's output.
    #[error(transparent)]
    ModelOutput(#[from] ModelOutputError),

    /// The completion call itself failed.
    #[error(transparent)]
    Completion(#[from] CompletionError),
}

impl AssistantError {
    /// Advises the caller whether repeating the operation may succeed.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            AssistantError::Configuration { .. } | AssistantError::ModelOutput(_) => {
                RetryPolicy::NonRetryable
            }
            AssistantError::Completion(err) => err.retry_policy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{AssistantError, ModelOutputError, RetryPolicy};
    use crate::completion::CompletionError;

    #[test]
    fn model_output_error_message_includes_raw_text() {
        let err = ModelOutputError::new("missing title", "{\"description\":\"x\"}");
        let message = err.to_string();
        assert!(message.contains("missing title"));
        assert!(message.contains("{\"description\":\"x\"}"));
    }

    #[test]
    fn configuration_and_output_errors_are_not_retryable() {
        let config = AssistantError::Configuration {
            message: "missing endpoint".to_string(),
        };
        let output = AssistantError::from(ModelOutputError::new("bad", "raw"));
        assert_eq!(config.retry_policy(), RetryPolicy::NonRetryable);
        assert_eq!(output.retry_policy(), RetryPolicy::NonRetryable);
    }

    #[test]
    fn completion_errors_delegate_their_policy() {
        let err = AssistantError::from(CompletionError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        });
        assert_eq!(
            err.retry_policy(),
            RetryPolicy::Retryable {
                after: Some(Duration::from_secs(7))
            }
        );
    }
}
