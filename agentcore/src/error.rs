//! Crate-wide error type for the agent execution core.

use thiserror::Error;

/// A type alias for `Result<T, AgentCoreError>`.
pub type Result<T> = std::result::Result<T, AgentCoreError>;

/// Errors the Agent Loop can surface to a caller.
///
/// `ToolNotFound` deliberately has no variant here — a missing tool is a
/// logged, skipped condition, not a failure (see [`crate::agent::loop_exec`]).
#[derive(Debug, Error)]
pub enum AgentCoreError {
    /// Resuming a paused run without a leading approval-response message.
    #[error("cannot resume paused run: expected an approval response as the first message")]
    InvalidResume,

    /// The loop ran for `max_loops` iterations without completing.
    #[error("agent exceeded max loop count of {max_loops} (reached iteration {iteration})")]
    MaxLoopsExceeded {
        /// The configured bound.
        max_loops: usize,
        /// The iteration count observed when the bound was hit.
        iteration: usize,
    },

    /// The run's cancellation key was observed set at an iteration boundary.
    #[error("run was cancelled: {reason}")]
    Cancelled {
        /// The reason supplied to `Cancel`, if any.
        reason: String,
    },

    /// The LLM provider returned an error from a streaming call.
    #[error("llm call failed: {0}")]
    Llm(String),

    /// A tool invocation returned an error.
    #[error("tool '{tool_name}' failed: {message}")]
    Tool {
        /// Name of the failing tool.
        tool_name: String,
        /// The underlying error message.
        message: String,
    },

    /// Loading or persisting conversation history failed.
    #[error("history error: {0}")]
    History(String),

    /// The durable step executor failed to commit or replay a checkpoint.
    #[error("step '{name}' failed: {message}")]
    Step {
        /// The step name (see the naming discipline in [`crate::step`]).
        name: String,
        /// The underlying error message.
        message: String,
    },

    /// Serializing or deserializing a persisted value failed.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl AgentCoreError {
    /// Build a [`AgentCoreError::Tool`] error.
    #[must_use]
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Build a [`AgentCoreError::Step`] error.
    #[must_use]
    pub fn step(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Step {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Build a [`AgentCoreError::History`] error.
    #[must_use]
    pub fn history(message: impl Into<String>) -> Self {
        Self::History(message.into())
    }

    /// Build a [`AgentCoreError::Llm`] error.
    #[must_use]
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }
}
