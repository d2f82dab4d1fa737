//! Result shapes returned to callers of the gate and draft operations.
//!
//! Both shapes are built exclusively by [`crate::normalize`] from untrusted
//! model text. Their fields are private so a caller can never observe a
//! partially-populated or out-of-range value; accessors expose the data and
//! `Serialize` produces the camelCase wire form.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Confidence
// ---------------------------------------------------------------------------

/// The model's self-reported certainty, always in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Confidence(f64);

impl Confidence {
    /// A confidence of exactly zero.
    pub const ZERO: Confidence = Confidence(0.0);

    /// Clamps `value` into `[0.0, 1.0]`.
    ///
    /// Returns `None` for NaN, which has no meaningful position in the range.
    /// Infinities clamp to the nearest bound.
    #[must_use]
    pub fn clamped(value: f64) -> Option<Self> {
        if value.is_nan() {
            None
        } else {
            Some(Self(value.clamp(0.0, 1.0)))
        }
    }

    /// Returns the score as an `f64` in `[0.0, 1.0]`.
    pub fn as_f64(self) -> f64 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Judgment on whether free-text notes are specific enough to draft from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResult {
    valid: bool,
    reason: String,
    required_questions: Vec<String>,
    confidence: Confidence,
}

impl GateResult {
    pub(crate) fn new(
        valid: bool,
        reason: String,
        required_questions: Vec<String>,
        confidence: Confidence,
    ) -> Self {
        Self {
            valid,
            reason,
            required_questions,
            confidence,
        }
    }

    /// `true` when the notes describe an actionable item.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Short human-readable explanation of the judgment. Never empty.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Follow-up questions the author should answer; non-empty, trimmed strings.
    pub fn required_questions(&self) -> &[String] {
        &self.required_questions
    }

    /// Certainty of the judgment.
    pub fn confidence(&self) -> Confidence {
        self.confidence
    }
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// A structured work-item proposal generated from notes.
///
/// The prompt asks for titles of at most 120 characters; that limit is a
/// request to the model and is not enforced here.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftResult {
    title: String,
    description: String,
    acceptance_criteria: Vec<String>,
    tasks: Vec<String>,
    assumptions: Vec<String>,
    confidence: Option<Confidence>,
}

impl DraftResult {
    pub(crate) fn new(
        title: String,
        description: String,
        acceptance_criteria: Vec<String>,
        tasks: Vec<String>,
        assumptions: Vec<String>,
        confidence: Option<Confidence>,
    ) -> Self {
        Self {
            title,
            description,
            acceptance_criteria,
            tasks,
            assumptions,
            confidence,
        }
    }

    /// Work-item title. Never empty.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Markdown description; empty when the model supplied none.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Testable acceptance criteria in the order the model produced them.
    pub fn acceptance_criteria(&self) -> &[String] {
        &self.acceptance_criteria
    }

    /// Small actionable implementation steps.
    pub fn tasks(&self) -> &[String] {
        &self.tasks
    }

    /// Information the notes did not supply and the model had to assume.
    pub fn assumptions(&self) -> &[String] {
        &self.assumptions
    }

    /// Certainty of the draft, or `None` when the model expressed none.
    pub fn confidence(&self) -> Option<Confidence> {
        self.confidence
    }
}
