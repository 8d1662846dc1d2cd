//! Test doubles shared across this crate's own unit tests and available to
//! downstream crates under the `experimental` feature for their own Agent
//! Loop tests.

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use std::sync::Mutex;

use crate::agent::context::RunContext;
use crate::agent::llm::{LlmProvider, Request};
use crate::agent::tool::{Tool, ToolKind, ToolUnion};
use crate::error::{AgentCoreError, Result};
use crate::message::{InputMessage, ToolCall};
use crate::stream::ResponseChunk;

/// A scripted [`LlmProvider`]: each call to
/// [`LlmProvider::new_streaming_responses`] pops the next queued chunk
/// sequence and replays it, erroring once the script is exhausted.
pub struct MockLlm {
    scripts: Mutex<Vec<Vec<ResponseChunk>>>,
}

impl MockLlm {
    /// Build a provider with no scripted calls — any call to it fails.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            scripts: Mutex::new(Vec::new()),
        }
    }

    /// Build a provider that replays `scripts` in order, one per call.
    #[must_use]
    pub fn scripted(scripts: Vec<Vec<ResponseChunk>>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
        }
    }
}

#[async_trait]
impl LlmProvider for MockLlm {
    async fn new_streaming_responses(
        &self,
        _request: Request,
    ) -> Result<BoxStream<'static, Result<ResponseChunk>>> {
        let mut scripts = self.scripts.lock().expect("mock llm lock");
        if scripts.is_empty() {
            return Err(AgentCoreError::llm("mock llm has no more scripted calls"));
        }
        let chunks = scripts.remove(0);
        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }
}

/// A tool that always succeeds with a fixed output, for exercising the
/// immediate-execution path.
pub struct StubTool {
    name: String,
    output: String,
    need_approval: bool,
}

impl StubTool {
    /// Build a stub tool named `name` that always returns `output`.
    #[must_use]
    pub fn new(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: output.into(),
            need_approval: false,
        }
    }

    /// Mark this stub as requiring human approval before execution.
    #[must_use]
    pub fn requiring_approval(mut self) -> Self {
        self.need_approval = true;
        self
    }
}

#[async_trait]
impl Tool for StubTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> ToolUnion {
        ToolUnion {
            kind: ToolKind::Function,
            name: self.name.clone(),
            description: format!("stub tool '{}' for tests", self.name),
            parameters: None,
        }
    }

    fn need_approval(&self) -> bool {
        self.need_approval
    }

    async fn execute(&self, _ctx: &RunContext, call: &ToolCall) -> Result<InputMessage> {
        Ok(InputMessage::FunctionCallOutputMessage {
            call_id: call.call_id.clone(),
            output: self.output.clone(),
        })
    }
}

/// Build the `output_text`/`output_item.done`/`response.completed` chunk
/// sequence for a plain-text assistant reply, the shape most scripted LLM
/// turns in this crate's tests need.
#[must_use]
pub fn text_reply_chunks(text: &str, usage: crate::usage::Usage) -> Vec<ResponseChunk> {
    vec![
        ResponseChunk::OutputTextDelta {
            item_index: 0,
            delta: text.to_string(),
        },
        ResponseChunk::OutputItemDone {
            index: 0,
            item: crate::stream::OutputItem::Message {
                text: text.to_string(),
            },
        },
        ResponseChunk::ResponseCompleted { usage },
    ]
}

/// Build the chunk sequence for a single function-call turn, the shape most
/// scripted LLM turns exercising tool execution need.
#[must_use]
pub fn function_call_chunks(call: ToolCall, usage: crate::usage::Usage) -> Vec<ResponseChunk> {
    vec![
        ResponseChunk::OutputItemDone {
            index: 0,
            item: crate::stream::OutputItem::FunctionCall { call },
        },
        ResponseChunk::ResponseCompleted { usage },
    ]
}
