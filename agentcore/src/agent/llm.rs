//! The LLM provider interface consumed by the Agent Loop (§6). The core
//! never speaks a vendor wire format directly — a gateway adapter outside
//! this crate translates `Request`/`ResponseChunk` to and from it.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::InputMessage;
use crate::stream::ResponseChunk;

use super::tool::ToolUnion;

/// Either a bare string prompt or a full message history, the two shapes
/// `Request::input` accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestInput {
    /// A single prompt string.
    Text(String),
    /// A full ordered message history.
    Messages(Vec<InputMessage>),
}

/// Free-form model parameters (temperature, max tokens, structured-output
/// schema, ...). Kept as a JSON object since the core has no opinion on
/// which parameters a given provider supports.
pub type RequestParameters = serde_json::Map<String, serde_json::Value>;

/// A streaming completion request, translated to a vendor wire format by an
/// external gateway adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// The system instruction for this call.
    pub instructions: String,
    /// The conversation input.
    pub input: RequestInput,
    /// Tools available to the model for this call.
    pub tools: Vec<ToolUnion>,
    /// Free-form model parameters.
    pub parameters: RequestParameters,
}

/// The LLM provider, consumed as a streaming endpoint.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Open a streaming completion call, returning a lazy sequence of
    /// response chunks.
    async fn new_streaming_responses(
        &self,
        request: Request,
    ) -> Result<BoxStream<'static, Result<ResponseChunk>>>;
}
