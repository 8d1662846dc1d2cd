//! The streaming accumulator (C4): folds a lazy sequence of model events
//! into a structured `Response` while forwarding every chunk to a
//! subscriber callback.
//!
//! Chunks are delivered to the subscriber in source order; the subscriber
//! must not block the producer beyond local fan-out (slow subscribers
//! should buffer or drop on their own side — this module never does either
//! for them).

use futures::Stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::{InputMessage, ToolCall};
use crate::usage::Usage;

/// One event in the LLM streaming sequence, or a custom lifecycle/tool-
/// output event the core itself produces.
///
/// `output_item.added`/`content_part.added`/delta variants exist to be
/// forwarded to the subscriber verbatim; the accumulator only folds state
/// from the `*.done` and `response.completed` variants (see
/// [`accumulate`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseChunk {
    /// A new output item (message, function call, reasoning block, ...)
    /// started.
    OutputItemAdded {
        /// Index of the item within the response.
        index: usize,
    },
    /// An output item finished; carries its final content.
    OutputItemDone {
        /// Index of the item within the response.
        index: usize,
        /// The completed item.
        item: OutputItem,
    },
    /// A content part within a message item started.
    ContentPartAdded {
        /// Index of the owning output item.
        item_index: usize,
    },
    /// A content part within a message item finished.
    ContentPartDone {
        /// Index of the owning output item.
        item_index: usize,
    },
    /// An incremental slice of assistant text.
    OutputTextDelta {
        /// Index of the owning output item.
        item_index: usize,
        /// The text slice.
        delta: String,
    },
    /// Assistant text for an item is complete.
    OutputTextDone {
        /// Index of the owning output item.
        item_index: usize,
    },
    /// An incremental slice of a function call's JSON arguments.
    FunctionCallArgumentsDelta {
        /// Index of the owning output item.
        item_index: usize,
        /// The JSON text slice.
        delta: String,
    },
    /// A function call's arguments are fully received.
    FunctionCallArgumentsDone {
        /// Index of the owning output item.
        item_index: usize,
    },
    /// An incremental slice of a reasoning summary.
    ReasoningSummaryDelta {
        /// Index of the owning output item.
        item_index: usize,
        /// The text slice.
        delta: String,
    },
    /// A reasoning summary is complete.
    ReasoningSummaryDone {
        /// Index of the owning output item.
        item_index: usize,
    },
    /// The whole streamed response completed; carries final usage.
    ResponseCompleted {
        /// Token usage for this LLM call.
        usage: Usage,
    },
    /// Custom lifecycle event — not part of the model's own stream, used by
    /// the Agent Loop to signal run-level transitions to the subscriber.
    RunLifecycle {
        /// The lifecycle event name (`run.created`, `run.paused`, ...).
        name: String,
        /// Event payload.
        payload: serde_json::Value,
    },
    /// The output of a completed tool execution, forwarded to the
    /// subscriber alongside model chunks.
    FunctionCallOutput {
        /// Correlation key of the call this is the output of.
        call_id: String,
        /// Identifier of the output item, if any.
        id: Option<String>,
        /// The tool's output, rendered as a string.
        output: String,
    },
}

/// A completed output item, as recorded by `output_item.done`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputItem {
    /// Assistant text message.
    Message {
        /// The message text, assembled from its content parts.
        text: String,
    },
    /// A tool call request.
    FunctionCall {
        /// The call, with its arguments fully assembled.
        call: ToolCall,
    },
    /// A reasoning block.
    Reasoning {
        /// Human-readable summary.
        summary: String,
        /// Opaque encrypted content, if supplied by the provider.
        encrypted_content: Option<String>,
    },
    /// An image generation result.
    ImageGenerationCall {
        /// Identifier of the generated artifact.
        result_id: String,
    },
}

/// The structured result of folding a chunk sequence: every completed
/// output item plus the latched final usage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    /// Completed output items, in the order their `output_item.done` chunk
    /// arrived.
    pub output: Vec<OutputItem>,
    /// Usage latched from `response.completed`; zero if the stream ended
    /// without one (callers should treat that as a malformed stream, but
    /// the accumulator itself does not fail on it).
    pub usage: Usage,
}

impl Response {
    /// Convert every completed output item into its `InputMessage`
    /// equivalent, for appending to history staging.
    #[must_use]
    pub fn to_input_messages(&self) -> Vec<InputMessage> {
        self.output
            .iter()
            .map(|item| match item {
                OutputItem::Message { text } => InputMessage::OutputMessage {
                    content: text.clone(),
                },
                OutputItem::FunctionCall { call } => InputMessage::FunctionCallMessage {
                    call: call.clone(),
                },
                OutputItem::Reasoning {
                    summary,
                    encrypted_content,
                } => InputMessage::ReasoningMessage {
                    summary: summary.clone(),
                    encrypted_content: encrypted_content.clone(),
                },
                OutputItem::ImageGenerationCall { result_id } => {
                    InputMessage::ImageGenerationCallMessage {
                        result_id: result_id.clone(),
                    }
                }
            })
            .collect()
    }

    /// Extract the tool calls requested by this response, preserving order.
    #[must_use]
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.output
            .iter()
            .filter_map(|item| match item {
                OutputItem::FunctionCall { call } => Some(call.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Fold a lazy chunk sequence into a [`Response`], invoking `subscriber` on
/// every chunk in source order before folding it.
///
/// `subscriber` errors are not currently surfaced by this function — per
/// spec, the subscriber "must not block the producer beyond local fan-out";
/// callers that need error propagation from their subscriber should handle
/// it inside the closure and communicate failure through a side channel.
pub async fn accumulate<S, F>(mut chunks: S, mut subscriber: F) -> Result<Response>
where
    S: Stream<Item = Result<ResponseChunk>> + Unpin,
    F: FnMut(&ResponseChunk),
{
    let mut response = Response::default();

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        subscriber(&chunk);

        match &chunk {
            ResponseChunk::OutputItemDone { item, .. } => {
                response.output.push(item.clone());
            }
            ResponseChunk::ResponseCompleted { usage } => {
                response.usage = *usage;
            }
            _ => {}
        }
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::{OutputItem, ResponseChunk, accumulate};
    use crate::message::{InputMessage, ToolCall};
    use crate::usage::Usage;
    use futures::stream;

    #[tokio::test]
    async fn folds_message_and_latches_usage() {
        let chunks = vec![
            Ok(ResponseChunk::OutputTextDelta {
                item_index: 0,
                delta: "Hi".into(),
            }),
            Ok(ResponseChunk::OutputItemDone {
                index: 0,
                item: OutputItem::Message { text: "Hi".into() },
            }),
            Ok(ResponseChunk::ResponseCompleted {
                usage: Usage {
                    input_tokens: 5,
                    output_tokens: 1,
                    cached_input_tokens: 0,
                    total_tokens: 6,
                },
            }),
        ];
        let mut forwarded = Vec::new();
        let response = accumulate(stream::iter(chunks), |chunk| {
            forwarded.push(format!("{chunk:?}"));
        })
        .await
        .expect("accumulate succeeds");

        assert_eq!(forwarded.len(), 3);
        assert_eq!(response.usage.total_tokens, 6);
        let messages = response.to_input_messages();
        assert_eq!(messages.len(), 1);
        assert!(matches!(&messages[0], InputMessage::OutputMessage { content } if content == "Hi"));
    }

    #[tokio::test]
    async fn extracts_tool_calls_in_order() {
        let call = |n: &str| ToolCall {
            id: n.into(),
            call_id: n.into(),
            name: n.into(),
            arguments: "{}".into(),
            thought_signature: None,
        };
        let chunks = vec![
            Ok(ResponseChunk::OutputItemDone {
                index: 0,
                item: OutputItem::FunctionCall { call: call("a") },
            }),
            Ok(ResponseChunk::OutputItemDone {
                index: 1,
                item: OutputItem::FunctionCall { call: call("b") },
            }),
        ];
        let response = accumulate(stream::iter(chunks), |_| {})
            .await
            .expect("accumulate succeeds");
        let names: Vec<_> = response.tool_calls().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
