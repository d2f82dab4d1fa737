//! The caller-facing gate and draft operations.
//!
//! Each operation performs at most one completion through the injected
//! [`ChatCompletion`] and keeps no state between calls, so a single
//! [`WorkItemAssistant`] may be shared freely across tasks.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::completion::ChatCompletion;
use crate::errors::AssistantError;
use crate::gate;
use crate::identifiers::{ProcessName, RequestId, WorkItemType};
use crate::normalize;
use crate::prompts;
use crate::types::{DraftResult, GateResult};

/// Turns free-text notes into gate judgments and work-item drafts.
#[derive(Clone)]
pub struct WorkItemAssistant {
    completion: Arc<dyn ChatCompletion>,
}

impl WorkItemAssistant {
    /// Creates an assistant backed by `completion`.
    pub fn new(completion: Arc<dyn ChatCompletion>) -> Self {
        Self { completion }
    }

    /// Judges whether `notes` describe an actionable work item.
    ///
    /// Notes that fail the local pre-check are answered without a model call.
    /// Unusable model output resolves to a fixed fallback judgment, so the
    /// only errors are completion failures.
    #[tracing::instrument(
        name = "drafting.validate_notes",
        skip_all,
        fields(request_id = %RequestId::new_random(), notes_chars = notes.chars().count())
    )]
    pub async fn validate_notes(&self, notes: &str) -> Result<GateResult, AssistantError> {
        if let Some(rejected) = gate::precheck(notes) {
            debug!("notes rejected by local pre-check");
            return Ok(rejected);
        }

        let raw = self.completion.complete(&prompts::gate_request(notes)).await?;
        let result = normalize::normalize_gate(&raw);
        if result == normalize::unparsable_gate_fallback() {
            warn!(raw_chars = raw.len(), "gate output unparsable; using fallback judgment");
        }

        info!(
            valid = result.is_valid(),
            confidence = result.confidence().as_f64(),
            questions = result.required_questions().len(),
            "notes validated"
        );
        Ok(result)
    }

    /// Generates a work-item draft from notes that have already passed the gate.
    ///
    /// # Errors
    ///
    /// - [`AssistantError::Completion`] when the completion call fails.
    /// - [`AssistantError::ModelOutput`] when the answer is not JSON or has no title.
    #[tracing::instrument(
        name = "drafting.generate_draft",
        skip_all,
        fields(
            request_id = %RequestId::new_random(),
            work_item_type = %work_item_type,
            process = %process,
            has_context = extra_context.is_some(),
        )
    )]
    pub async fn generate_draft(
        &self,
        notes: &str,
        work_item_type: &WorkItemType,
        process: &ProcessName,
        extra_context: Option<&str>,
    ) -> Result<DraftResult, AssistantError> {
        let request = prompts::draft_request(notes, work_item_type, process, extra_context);
        let raw = self.completion.complete(&request).await?;

        let draft = normalize::normalize_draft(&raw).inspect_err(|err| {
            warn!(reason = %err.reason, raw_chars = err.raw.len(), "draft output unusable");
        })?;

        info!(
            acceptance_criteria = draft.acceptance_criteria().len(),
            tasks = draft.tasks().len(),
            assumptions = draft.assumptions().len(),
            "draft generated"
        );
        Ok(draft)
    }

    /// Sends `prompt` with a generic assistant instruction and returns the
    /// trimmed answer.
    ///
    /// Useful as a connectivity and credential check.
    #[tracing::instrument(name = "drafting.respond", skip_all, fields(request_id = %RequestId::new_random()))]
    pub async fn respond(&self, prompt: &str) -> Result<String, AssistantError> {
        let raw = self
            .completion
            .complete(&prompts::freeform_request(prompt))
            .await?;
        Ok(raw.trim().to_string())
    }
}

impl std::fmt::Debug for WorkItemAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkItemAssistant").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::WorkItemAssistant;
    use crate::completion::{ChatCompletion, CompletionError, CompletionRequest};
    use crate::errors::AssistantError;
    use crate::gate::TOO_SHORT_REASON;
    use crate::identifiers::{ProcessName, WorkItemType};
    use crate::normalize::unparsable_gate_fallback;

    /// Replays one canned answer and records every request it receives.
    struct ScriptedCompletion {
        answer: Result<String, fn() -> CompletionError>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedCompletion {
        fn answering(text: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(text.to_string()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing(make: fn() -> CompletionError) -> Arc<Self> {
            Arc::new(Self {
                answer: Err(make),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().map(|r| r.len()).unwrap_or(0)
        }
    }

    #[async_trait]
    impl ChatCompletion for ScriptedCompletion {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }
            match &self.answer {
                Ok(text) => Ok(text.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    #[tokio::test]
    async fn short_notes_never_reach_the_model() {
        let fake = ScriptedCompletion::answering(r#"{"valid": true}"#);
        let assistant = WorkItemAssistant::new(fake.clone());

        let gate = assistant.validate_notes("too short").await.expect("gate resolves");

        assert_eq!(fake.calls(), 0);
        assert_eq!(gate.reason(), TOO_SHORT_REASON);
        assert_eq!(gate.confidence().as_f64(), 0.2);
    }

    #[tokio::test]
    async fn gate_uses_model_answer_for_longer_notes() {
        let fake = ScriptedCompletion::answering(
            r#"{"valid": true, "reason": "clear", "requiredQuestions": [], "confidence": 0.8}"#,
        );
        let assistant = WorkItemAssistant::new(fake.clone());

        let gate = assistant
            .validate_notes("Add single sign-on to the customer portal")
            .await
            .expect("gate resolves");

        assert_eq!(fake.calls(), 1);
        assert!(gate.is_valid());
        assert_eq!(gate.confidence().as_f64(), 0.8);
    }

    #[tokio::test]
    async fn gate_degrades_to_fallback_on_garbage() {
        let fake = ScriptedCompletion::answering("I cannot help with that.");
        let assistant = WorkItemAssistant::new(fake);

        let gate = assistant
            .validate_notes("Add single sign-on to the customer portal")
            .await
            .expect("gate resolves");

        assert_eq!(gate, unparsable_gate_fallback());
    }

    #[tokio::test]
    async fn gate_propagates_completion_failures() {
        let fake = ScriptedCompletion::failing(|| CompletionError::Transport {
            message: "connection reset".to_string(),
        });
        let assistant = WorkItemAssistant::new(fake);

        let err = assistant
            .validate_notes("Add single sign-on to the customer portal")
            .await
            .expect_err("transport failure surfaces");

        assert!(matches!(
            err,
            AssistantError::Completion(CompletionError::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn draft_sends_process_and_type_in_one_call() {
        let fake = ScriptedCompletion::answering(
            r#"{"title": "Add SSO", "tasks": ["Configure IdP"], "confidence": 0.6}"#,
        );
        let assistant = WorkItemAssistant::new(fake.clone());
        let kind = WorkItemType::new("Feature").expect("non-blank");

        let draft = assistant
            .generate_draft("Users want SSO", &kind, &ProcessName::default(), Some("Entra ID"))
            .await
            .expect("draft produced");

        assert_eq!(draft.title(), "Add SSO");
        assert_eq!(draft.tasks(), ["Configure IdP".to_string()]);

        let requests = fake.requests.lock().expect("lock");
        assert_eq!(requests.len(), 1);
        assert!(requests[0].user.contains("WorkItemType: Feature"));
        assert!(requests[0].user.contains("Process: Scrum"));
        assert!(requests[0].user.contains("Entra ID"));
    }

    #[tokio::test]
    async fn draft_without_title_is_a_model_output_error() {
        let fake = ScriptedCompletion::answering(r#"{"description": "x"}"#);
        let assistant = WorkItemAssistant::new(fake);

        let err = assistant
            .generate_draft(
                "Users want SSO",
                &WorkItemType::default(),
                &ProcessName::default(),
                None,
            )
            .await
            .expect_err("title missing");

        match err {
            AssistantError::ModelOutput(output) => assert_eq!(output.raw, r#"{"description": "x"}"#),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn respond_trims_the_answer() {
        let fake = ScriptedCompletion::answering("  Hello there.\n");
        let assistant = WorkItemAssistant::new(fake.clone());

        let answer = assistant.respond("Say hello in one sentence.").await.expect("answer");

        assert_eq!(answer, "Hello there.");
        assert!(!fake.requests.lock().expect("lock")[0].json_object);
    }
}
