//! Local pre-check run before the gate's model call.
//!
//! Notes shorter than [`MIN_NOTES_CHARS`] (after trimming) cannot describe an
//! actionable item, so the gate answers them without spending a completion.

use crate::types::{Confidence, GateResult};

/// Minimum number of characters, after trimming, worth sending to the model.
pub const MIN_NOTES_CHARS: usize = 10;

/// Reason reported for notes rejected by the pre-check.
pub const TOO_SHORT_REASON: &str = "Input is too short or unclear to describe a work item";

/// Follow-up question reported for notes rejected by the pre-check.
pub const TOO_SHORT_QUESTION: &str =
    "What should be built or fixed, for whom, and what outcome is expected?";

const TOO_SHORT_CONFIDENCE: f64 = 0.2;

/// Returns the fixed rejection when `notes` is too short to judge, or `None`
/// when the notes should go to the model.
///
/// Length is counted in characters, not bytes.
pub fn precheck(notes: &str) -> Option<GateResult> {
    if notes.trim().chars().count() >= MIN_NOTES_CHARS {
        return None;
    }
    Some(GateResult::new(
        false,
        TOO_SHORT_REASON.to_string(),
        vec![TOO_SHORT_QUESTION.to_string()],
        Confidence::clamped(TOO_SHORT_CONFIDENCE).unwrap_or(Confidence::ZERO),
    ))
}
