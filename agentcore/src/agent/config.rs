//! Immutable agent configuration (§4.5 inputs), built the way the teacher
//! builds its agent config: a plain builder with sensible defaults rather
//! than a constructor with a dozen positional arguments.

use std::sync::Arc;

use super::llm::LlmProvider;
use super::prompt::SystemPromptProvider;
use super::tool::{MCPToolset, Tool};
use crate::history::Summarizer;

/// Default bound on loop iterations when a config doesn't set one
/// explicitly.
pub const DEFAULT_MAX_LOOPS: usize = 20;

/// Immutable, per-agent configuration shared across every run of that
/// agent.
pub struct AgentConfig {
    /// The agent's registered name (see [`crate::registry`]).
    pub name: String,
    /// The LLM backend this agent calls.
    pub llm: Arc<dyn LlmProvider>,
    /// Statically configured tools.
    pub tools: Vec<Box<dyn Tool>>,
    /// MCP toolsets resolved at the start of each run.
    pub mcp_servers: Vec<Arc<dyn MCPToolset>>,
    /// Optional system-prompt provider; falls back to a constant when
    /// absent.
    pub instruction: Option<Arc<dyn SystemPromptProvider>>,
    /// Summarization policy for long-running threads.
    pub summarizer: Arc<dyn Summarizer>,
    /// Free-form model parameters merged into every request.
    pub parameters: serde_json::Map<String, serde_json::Value>,
    /// JSON schema for structured output, if the agent is configured to
    /// produce one.
    pub output_schema: Option<schemars::Schema>,
    /// Bound on loop iterations before `MaxLoopsExceeded`.
    pub max_loops: usize,
}

impl AgentConfig {
    /// Start building a config for an agent named `name` backed by `llm`.
    #[must_use]
    pub fn builder(name: impl Into<String>, llm: Arc<dyn LlmProvider>) -> AgentConfigBuilder {
        AgentConfigBuilder {
            name: name.into(),
            llm,
            tools: Vec::new(),
            mcp_servers: Vec::new(),
            instruction: None,
            summarizer: Arc::new(crate::history::NoopSummarizer),
            parameters: serde_json::Map::new(),
            output_schema: None,
            max_loops: DEFAULT_MAX_LOOPS,
        }
    }
}

/// Fluent builder for [`AgentConfig`].
pub struct AgentConfigBuilder {
    name: String,
    llm: Arc<dyn LlmProvider>,
    tools: Vec<Box<dyn Tool>>,
    mcp_servers: Vec<Arc<dyn MCPToolset>>,
    instruction: Option<Arc<dyn SystemPromptProvider>>,
    summarizer: Arc<dyn Summarizer>,
    parameters: serde_json::Map<String, serde_json::Value>,
    output_schema: Option<schemars::Schema>,
    max_loops: usize,
}

impl AgentConfigBuilder {
    /// Add a statically configured tool.
    #[must_use]
    pub fn tool(mut self, tool: Box<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Add an MCP toolset resolved at the start of each run.
    #[must_use]
    pub fn mcp_server(mut self, toolset: Arc<dyn MCPToolset>) -> Self {
        self.mcp_servers.push(toolset);
        self
    }

    /// Configure the system-prompt provider.
    #[must_use]
    pub fn instruction(mut self, provider: Arc<dyn SystemPromptProvider>) -> Self {
        self.instruction = Some(provider);
        self
    }

    /// Configure the summarization policy.
    #[must_use]
    pub fn summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    /// Merge in a model parameter.
    #[must_use]
    pub fn parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Configure a structured-output schema.
    #[must_use]
    pub fn output_schema(mut self, schema: schemars::Schema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Override the loop bound (default [`DEFAULT_MAX_LOOPS`]).
    #[must_use]
    pub const fn max_loops(mut self, max_loops: usize) -> Self {
        self.max_loops = max_loops;
        self
    }

    /// Finalize the configuration.
    #[must_use]
    pub fn build(self) -> AgentConfig {
        AgentConfig {
            name: self.name,
            llm: self.llm,
            tools: self.tools,
            mcp_servers: self.mcp_servers,
            instruction: self.instruction,
            summarizer: self.summarizer,
            parameters: self.parameters,
            output_schema: self.output_schema,
            max_loops: self.max_loops,
        }
    }
}
