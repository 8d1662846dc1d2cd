//! The tool interface consumed by the Agent Loop (§6), plus the MCP
//! toolset interface — MCP *transport* stays out of scope, only the
//! `ListTools` contract is defined here.

use async_trait::async_trait;
use schemars::Schema;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::{InputMessage, ToolCall};

use super::context::RunContext;

/// The kind of tool a `ToolUnion` describes, mirroring the tagged kinds a
/// provider's `Tools` request field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// A user-defined callable function.
    Function,
    /// The provider's built-in web search tool.
    WebSearch,
    /// The provider's built-in image generation tool.
    ImageGeneration,
    /// The provider's built-in code execution tool.
    CodeExecution,
}

/// The schema exposed to the model for one tool, tagged by kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUnion {
    /// What kind of tool this is.
    pub kind: ToolKind,
    /// The tool's name, as the model will reference it in calls.
    pub name: String,
    /// Human-readable description shown to the model.
    pub description: String,
    /// JSON schema for the tool's arguments (irrelevant for built-in kinds
    /// other than `Function`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Schema>,
}

/// A callable tool. Implementations are looked up by name (first match
/// wins, per the tie-break in §4.5) and executed inside a durable step
/// named `tool-{id}-{name}`, keyed by the output item's `id` rather than
/// its `call_id`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's stable name, used for lookup and step naming.
    fn name(&self) -> &str;

    /// The schema exposed to the model for this tool.
    fn definition(&self) -> ToolUnion;

    /// Whether this tool requires human approval before it may run.
    fn need_approval(&self) -> bool {
        false
    }

    /// Execute the tool against a requested call, producing its output
    /// message. Errors here are fatal for the run — no synthetic output
    /// message is produced on failure, per the error handling design.
    async fn execute(
        &self,
        ctx: &RunContext,
        call: &ToolCall,
    ) -> Result<InputMessage>;
}

/// A convenience pairing of a tool's schema with its approval requirement,
/// for composing static tool sets without a full `Tool` implementation
/// (e.g. wrapping a managed sub-agent as a tool).
#[derive(Debug, Clone)]
pub struct BaseTool {
    /// The schema exposed to the model.
    pub definition: ToolUnion,
    /// Whether this tool requires approval.
    pub requires_approval: bool,
}

/// MCP toolset, consumed identically to static tools once resolved.
/// Discovery transport (the actual MCP client/protocol) is an external
/// collaborator; this crate only names the contract.
#[async_trait]
pub trait MCPToolset: Send + Sync {
    /// Resolve the tools this toolset currently exposes.
    async fn list_tools(&self, ctx: &RunContext) -> Result<Vec<Box<dyn Tool>>>;
}

/// Find the first tool matching `name`, or `None` if absent (a missing
/// tool is logged and skipped by the caller, never an error — see the
/// tie-breaks in §4.5).
#[must_use]
pub fn find_tool<'a>(tools: &'a [Box<dyn Tool>], name: &str) -> Option<&'a dyn Tool> {
    tools.iter().find(|tool| tool.name() == name).map(AsRef::as_ref)
}
