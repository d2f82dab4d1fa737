//! Newtype identifiers for the drafting domain.
//!
//! Names that travel into prompts or request URLs are wrapped in distinct
//! newtypes so a [`WorkItemType`] can never be passed where a [`ProcessName`]
//! is expected, even though both are strings under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is blank.
            ///
            /// Surrounding whitespace is removed.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Self(trimmed.to_string()))
                }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id! {
    /// The kind of work item to draft (e.g. `"PBI"`, `"Bug"`, `"Task"`).
    ///
    /// Passed verbatim into the draft prompt; the model shapes its output to it.
    WorkItemType
}

string_id! {
    /// The delivery process the work item belongs to (e.g. `"Scrum"`, `"Agile"`).
    ProcessName
}

string_id! {
    /// An Azure OpenAI deployment name.
    ///
    /// Used as the `model` field on the v1 endpoint and as a path segment on
    /// the versioned deployments endpoint.
    DeploymentName
}

impl Default for WorkItemType {
    fn default() -> Self {
        Self("PBI".to_string())
    }
}

impl Default for ProcessName {
    fn default() -> Self {
        Self("Scrum".to_string())
    }
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single gate or draft operation.
///
/// Generated fresh for every call and recorded on its tracing span so the
/// outbound completion and any resulting error can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a new random request identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{ProcessName, RequestId, WorkItemType};

    #[test]
    fn blank_names_are_rejected() {
        assert!(WorkItemType::new("").is_none());
        assert!(ProcessName::new("   ").is_none());
    }

    #[test]
    fn names_are_trimmed() {
        let kind = WorkItemType::new("  Bug ").expect("non-blank name");
        assert_eq!(kind.as_str(), "Bug");
        assert_eq!(kind.to_string(), "Bug");
    }

    #[test]
    fn defaults_match_scrum_backlog_items() {
        assert_eq!(WorkItemType::default().as_str(), "PBI");
        assert_eq!(ProcessName::default().as_str(), "Scrum");
    }

    #[test]
    fn request_ids_are_unique() {
        assert_ne!(RequestId::new_random(), RequestId::new_random());
    }
}
