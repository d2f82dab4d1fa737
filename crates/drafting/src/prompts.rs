//! Prompt assembly for the gate, draft, and free-form operations.

use crate::completion::CompletionRequest;
use crate::identifiers::{ProcessName, WorkItemType};

/// System instruction for the gate.
pub const GATE_SYSTEM_PROMPT: &str = r#"You are a strict requirements validator for Azure DevOps work items.

Return STRICT JSON only with this shape:
{
  "valid": true/false,
  "reason": "short explanation",
  "requiredQuestions": ["question1", "question2", "..."],
  "confidence": 0.0
}

Rules:
- valid=true ONLY if the text clearly describes a feature/bug/task with an understandable goal.
- If text is random, meaningless, too vague, or not actionable -> valid=false.
- requiredQuestions should ask what is missing (e.g., goal, expected behaviour, user, scope).
- confidence between 0.0 and 1.0"#;

/// System instruction for draft generation.
pub const DRAFT_SYSTEM_PROMPT: &str = r#"You are an Azure DevOps Work Item Assistant.
Generate work items from notes.

Return STRICT JSON with this exact shape:
{
  "title": "string",
  "description": "string (markdown)",
  "acceptanceCriteria": ["string", "..."],
  "tasks": ["string", "..."],
  "assumptions": ["string", "..."],
  "confidence": 0.0
}

Rules:
- Title <= 120 characters
- Description must be structured and based only on the notes/context provided
- Acceptance criteria must be testable (Given/When/Then or checklist style)
- Tasks must be actionable, small steps
- Put missing info into assumptions
- confidence between 0.0 and 1.0"#;

/// System instruction for free-form requests.
pub const ASSISTANT_SYSTEM_PROMPT: &str = "You are an AI Work Item Assistant.";

const GATE_TEMPERATURE: f32 = 0.0;
const DRAFT_TEMPERATURE: f32 = 0.2;

/// Builds the gate request for `notes`.
pub fn gate_request(notes: &str) -> CompletionRequest {
    CompletionRequest {
        system: GATE_SYSTEM_PROMPT.to_string(),
        user: notes.trim().to_string(),
        temperature: GATE_TEMPERATURE,
        json_object: true,
    }
}

/// Builds the draft request.
///
/// `extra_context` is appended only when it contains something other than
/// whitespace.
pub fn draft_request(
    notes: &str,
    work_item_type: &WorkItemType,
    process: &ProcessName,
    extra_context: Option<&str>,
) -> CompletionRequest {
    let mut user = format!(
        "Process: {process}\nWorkItemType: {work_item_type}\n\nNotes:\n{}",
        notes.trim()
    );

    if let Some(context) = extra_context.map(str::trim).filter(|c| !c.is_empty()) {
        user.push_str("\n\nAdditional context (use only if relevant):\n");
        user.push_str(context);
    }

    CompletionRequest {
        system: DRAFT_SYSTEM_PROMPT.to_string(),
        user,
        temperature: DRAFT_TEMPERATURE,
        json_object: true,
    }
}

/// Builds a free-form request with the generic assistant instruction.
pub fn freeform_request(prompt: &str) -> CompletionRequest {
    CompletionRequest {
        system: ASSISTANT_SYSTEM_PROMPT.to_string(),
        user: prompt.to_string(),
        temperature: DRAFT_TEMPERATURE,
        json_object: false,
    }
}

#[cfg(test)]
mod tests {
    use super::{draft_request, freeform_request, gate_request, GATE_SYSTEM_PROMPT};
    use crate::identifiers::{ProcessName, WorkItemType};

    #[test]
    fn gate_request_trims_notes_and_asks_for_json() {
        let request = gate_request("  add SSO to the portal \n");
        assert_eq!(request.system, GATE_SYSTEM_PROMPT);
        assert_eq!(request.user, "add SSO to the portal");
        assert_eq!(request.temperature, 0.0);
        assert!(request.json_object);
    }

    #[test]
    fn draft_request_embeds_process_and_type() {
        let request = draft_request(
            "Users need SSO",
            &WorkItemType::default(),
            &ProcessName::default(),
            None,
        );
        assert_eq!(
            request.user,
            "Process: Scrum\nWorkItemType: PBI\n\nNotes:\nUsers need SSO"
        );
        assert_eq!(request.temperature, 0.2);
    }

    #[test]
    fn draft_request_appends_non_blank_context_only() {
        let kind = WorkItemType::new("Bug").expect("non-blank");
        let process = ProcessName::new("Agile").expect("non-blank");

        let with_context = draft_request("n", &kind, &process, Some("Uses Entra ID"));
        assert!(with_context
            .user
            .ends_with("\n\nAdditional context (use only if relevant):\nUses Entra ID"));

        let blank_context = draft_request("n", &kind, &process, Some("   "));
        assert!(!blank_context.user.contains("Additional context"));
    }

    #[test]
    fn freeform_request_does_not_force_json() {
        assert!(!freeform_request("Say hello").json_object);
    }
}
