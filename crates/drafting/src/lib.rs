//! Work-item drafting domain.
//!
//! Turns free-text notes into structured work-item drafts by way of a hosted
//! chat-completion model, with a gate that rejects low-quality notes before
//! the more expensive draft call is made. Infrastructure crates implement the
//! [`ChatCompletion`] port defined here; this crate never performs I/O itself.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`assistant`] | [`WorkItemAssistant`]: `validate_notes`, `generate_draft`, `respond` |
//! | [`normalize`] | Repair and projection of raw model text into result types |
//! | [`gate`] | Local pre-check that short-circuits too-short notes |
//! | [`prompts`] | System instructions and request assembly |
//! | [`completion`] | The [`ChatCompletion`] port and its error type |
//! | [`types`] | [`GateResult`], [`DraftResult`], [`Confidence`] |
//! | [`identifiers`] | Newtype names (`WorkItemType`, `ProcessName`, ...) |
//! | [`errors`] | [`AssistantError`], [`ModelOutputError`], [`RetryPolicy`] |

pub mod assistant;
pub mod completion;
pub mod errors;
pub mod gate;
pub mod identifiers;
pub mod normalize;
pub mod prompts;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use assistant::WorkItemAssistant;
pub use completion::{ChatCompletion, CompletionError, CompletionRequest};
pub use errors::{AssistantError, ModelOutputError, RetryPolicy};
pub use identifiers::{DeploymentName, ProcessName, RequestId, WorkItemType};
pub use normalize::{extract_json_object, normalize_draft, normalize_gate};
pub use types::{Confidence, DraftResult, GateResult};
