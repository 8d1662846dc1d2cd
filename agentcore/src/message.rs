//! The wire vocabulary between the core and the LLM gateway, and the
//! persisted conversation record shapes built from it.
//!
//! `InputMessage` is a discriminated union: each variant serializes to a
//! JSON object tagged by `type`, so a provider codec working over the same
//! union round-trips without a translation layer in this crate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single tool call requested by the model.
///
/// `id` identifies the output item the call was part of; `call_id` is the
/// stable correlation key threaded through approval responses and tool
/// results — the two are not interchangeable even though most providers
/// set them equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier of the output item this call appeared in.
    pub id: String,
    /// Stable correlation key used by approval responses and tool results.
    pub call_id: String,
    /// Name of the tool being called.
    pub name: String,
    /// Arguments, as a JSON-encoded string (not a parsed value — the tool
    /// implementation owns parsing against its own argument schema).
    pub arguments: String,
    /// Opaque signature over the model's reasoning for this call, present
    /// only for providers that support encrypted chain-of-thought.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

/// The tagged union of messages exchanged between the core and the LLM
/// gateway. Exactly one variant is ever present per value; the `type` tag
/// is what a provider codec dispatches on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputMessage {
    /// A message authored by the end user.
    UserMessage {
        /// Plain-text content of the message.
        content: String,
    },
    /// Assistant text output.
    OutputMessage {
        /// The assistant's text content.
        content: String,
    },
    /// A reasoning trace the model produced before its answer.
    ReasoningMessage {
        /// Human-readable summary of the reasoning.
        summary: String,
        /// Opaque encrypted reasoning content, if the provider returns one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        encrypted_content: Option<String>,
    },
    /// A tool call the model requested.
    FunctionCallMessage {
        /// The requested call.
        call: ToolCall,
    },
    /// The result of executing a previously requested tool call.
    FunctionCallOutputMessage {
        /// Correlation key of the call this is the output of.
        call_id: String,
        /// The tool's output, rendered as a string.
        output: String,
    },
    /// A human-in-the-loop approval decision, used to resume a paused run.
    FunctionCallApprovalResponseMessage {
        /// Call ids the human approved. Per spec, entries with no matching
        /// pending call are simply ignored — this field only ever gates
        /// forward progress, it never causes a rejection.
        approved_call_ids: Vec<String>,
        /// Call ids the human rejected; these are synthesized into a
        /// decline output instead of being executed.
        rejected_call_ids: Vec<String>,
    },
    /// A web search invoked by the model as a built-in tool.
    WebSearchCallMessage {
        /// The search query.
        query: String,
        /// Result summary, once the call completes.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },
    /// An image generation call invoked by the model as a built-in tool.
    ImageGenerationCallMessage {
        /// Identifier of the generated image artifact.
        result_id: String,
    },
}

impl InputMessage {
    /// Construct a plain user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::UserMessage {
            content: content.into(),
        }
    }

    /// Construct a plain assistant output message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::OutputMessage {
            content: content.into(),
        }
    }

    /// Construct the fixed decline output for a rejected tool call.
    #[must_use]
    pub fn declined_tool_output(call_id: impl Into<String>) -> Self {
        Self::FunctionCallOutputMessage {
            call_id: call_id.into(),
            output: "Request to call this tool has been declined".to_string(),
        }
    }

    /// Whether this is a [`InputMessage::FunctionCallApprovalResponseMessage`].
    #[must_use]
    pub const fn is_approval_response(&self) -> bool {
        matches!(self, Self::FunctionCallApprovalResponseMessage { .. })
    }
}

/// A persisted record grouping all messages written by one run.
///
/// Invariant: either `meta.run_state` reports `IsComplete` (the record
/// closes its run) or this record is the tip of its thread and a
/// subsequent call extends the same `message_id` by array-append-on-conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Identifier of this record; doubles as the run id while the run is
    /// in progress.
    pub message_id: String,
    /// The thread this record belongs to.
    pub thread_id: String,
    /// The conversation the thread belongs to.
    pub conversation_id: String,
    /// The ordered messages appended by this run.
    pub messages: Vec<InputMessage>,
    /// Free-form metadata; `run_state`/`trace_id`/`usage`/`is_summary` are
    /// the keys the core itself reads and writes (see §6 of the design
    /// notes for the full persisted-key schema).
    pub meta: HashMap<String, serde_json::Value>,
}

impl ConversationMessage {
    /// Metadata key under which the serialized `RunState` lives.
    pub const META_RUN_STATE: &'static str = "run_state";
    /// Metadata key for the root trace id.
    pub const META_TRACE_ID: &'static str = "trace_id";
    /// Metadata key for the snapshot usage.
    pub const META_USAGE: &'static str = "usage";
    /// Metadata key marking a record as a summary.
    pub const META_IS_SUMMARY: &'static str = "is_summary";
}

/// A linear chain of `ConversationMessage`s within a conversation, linked by
/// `previous_message_id`.
///
/// Branching from a non-tip message is reserved: it creates a new `Thread`
/// in the same conversation rather than mutating this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    /// Identifier of this thread.
    pub thread_id: String,
    /// The conversation this thread belongs to.
    pub conversation_id: String,
    /// The first message record in the thread.
    pub origin_message_id: String,
    /// The most recently written message record in the thread.
    pub last_message_id: String,
    /// Free-form metadata.
    pub meta: HashMap<String, serde_json::Value>,
    /// When the thread was created.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// When the thread was last extended.
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A summarized prefix of a thread, usable in place of the messages it
/// covers when loading history for a later point in the thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    /// Identifier of this summary record.
    pub summary_id: String,
    /// The thread this summary covers a prefix of.
    pub thread_id: String,
    /// The message replacing the covered prefix.
    pub summary_message: InputMessage,
    /// The last message id the summary accounts for; messages strictly
    /// after this one must be re-fetched and appended when the summary is
    /// applied.
    pub last_summarized_message_id: String,
    /// Free-form metadata. The core sets `is_summary = true` here when
    /// persisting.
    pub meta: HashMap<String, serde_json::Value>,
    /// When the summary was produced; used to select the most recent
    /// summary with `created_at <= target.created_at`.
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::{InputMessage, ToolCall};

    #[test]
    fn tagged_union_round_trips() {
        let msg = InputMessage::FunctionCallMessage {
            call: ToolCall {
                id: "item_1".into(),
                call_id: "call_1".into(),
                name: "get_user_name".into(),
                arguments: "{}".into(),
                thought_signature: None,
            },
        };
        let json = serde_json::to_string(&msg).expect("serialize");
        assert!(json.contains("\"type\":\"function_call_message\""));
        let back: InputMessage = serde_json::from_str(&json).expect("deserialize");
        match back {
            InputMessage::FunctionCallMessage { call } => assert_eq!(call.name, "get_user_name"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn declined_output_has_fixed_string() {
        let msg = InputMessage::declined_tool_output("call_1");
        match msg {
            InputMessage::FunctionCallOutputMessage { output, .. } => {
                assert_eq!(output, "Request to call this tool has been declined");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn approval_response_detection() {
        let msg = InputMessage::FunctionCallApprovalResponseMessage {
            approved_call_ids: vec!["a".into()],
            rejected_call_ids: vec![],
        };
        assert!(msg.is_approval_response());
        assert!(!InputMessage::user("hi").is_approval_response());
    }
}
