//! Agent construction and the public entry point into the Agent Loop (C5).
//!
//! `Agent` pairs an immutable [`config::AgentConfig`] with the collaborators
//! a concrete runtime strategy supplies at call time — a [`StepExecutor`],
//! a [`HistoryStore`], and a subscriber callback. The *Local* strategy (the
//! only one this crate ships a concrete wrapper for — see
//! [`ConfirmationHandler`]) passes [`crate::step::NoopExecutor`]; a
//! Restate-like or Temporal-like strategy passes a durable implementation
//! bound to its own workflow context, which is why those two collaborators
//! are arguments to [`Agent::run`] rather than fields of `Agent` itself.

pub mod config;
pub mod context;
pub mod events;
pub mod llm;
pub mod loop_exec;
pub mod metrics;
pub mod prompt;
pub mod tool;

use std::sync::Arc;

use crate::error::Result;
use crate::history::HistoryStore;
use crate::message::{InputMessage, ToolCall};
use crate::step::StepExecutor;
use crate::stream::ResponseChunk;

pub use config::{AgentConfig, AgentConfigBuilder};
pub use context::{CancellationToken, RunContext};
pub use loop_exec::RunInput;
pub use metrics::StepInfo;

/// A configured agent, ready to drive runs under any runtime strategy.
pub struct Agent {
    config: AgentConfig,
}

impl Agent {
    /// Wrap a finished configuration.
    #[must_use]
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// This agent's registered name (see [`crate::registry`]).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The underlying configuration.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run (or resume) one invocation of the Agent Loop.
    ///
    /// `executor` and `history` are supplied by the caller's runtime
    /// strategy rather than stored on `Agent`, since a durable strategy
    /// binds a fresh executor to each workflow invocation.
    pub async fn run(
        &self,
        executor: &dyn StepExecutor,
        history: &dyn HistoryStore,
        ctx: RunContext,
        input: RunInput,
        callback: impl FnMut(&ResponseChunk) + Send,
    ) -> Result<AgentOutput> {
        loop_exec::run_agent(&self.config, executor, history, ctx, input, callback).await
    }
}

/// The terminal status of one Agent Loop invocation.
///
/// Spec literally includes an `Error` status alongside `Completed` and
/// `Paused`; this crate instead surfaces run failures through `Result::Err`
/// (see [`crate::error::AgentCoreError`]) rather than carrying an `Error`
/// variant here, since that is the idiomatic way to signal "this call
/// failed" in Rust and it lets `?` compose the loop the way every other
/// fallible step in this crate already does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The run produced a final answer.
    Completed,
    /// The run is waiting on a human approval response before it can
    /// continue; call [`Agent::run`] again with the same `previous_message_id`
    /// and an approval-response message to resume it.
    Paused,
}

/// The result of one [`Agent::run`] call.
#[derive(Debug, Clone)]
pub struct AgentOutput {
    /// Identifier of this run (the record id new messages were appended
    /// under).
    pub run_id: String,
    /// Whether the run completed or paused for approval.
    pub status: RunStatus,
    /// Messages produced by this run. Populated on [`RunStatus::Completed`];
    /// empty on [`RunStatus::Paused`] (nothing has been produced yet for the
    /// pending tool calls).
    pub output: Vec<InputMessage>,
    /// Tool calls awaiting a human decision. Populated on
    /// [`RunStatus::Paused`]; empty on [`RunStatus::Completed`].
    pub pending_approvals: Vec<ToolCall>,
    /// One entry per `CallLlm` iteration this call observed, for
    /// diagnostics. Reconstructed fresh each call — on a resumed run this
    /// only covers the iterations since the resume, not the whole run's
    /// history (see [`metrics::StepInfo`]).
    pub step_history: Vec<StepInfo>,
}

/// Sugar over the pause/resume protocol for the *Local* runtime strategy:
/// holds the state a caller needs to resume a paused run without having to
/// thread `previous_message_id`/`trace_id` through by hand.
///
/// This is Local-only convenience, not part of the durable protocol itself
/// — a Restate-like or Temporal-like strategy resumes by re-invoking the
/// workflow with an approval-response message directly.
pub struct ConfirmationHandler {
    agent: Arc<Agent>,
    namespace: String,
    conversation_id: String,
    thread_id: String,
    trace_id: String,
    last_message_id: Option<String>,
}

impl ConfirmationHandler {
    /// Build a handler bound to one thread of one conversation.
    #[must_use]
    pub fn new(
        agent: Arc<Agent>,
        namespace: impl Into<String>,
        conversation_id: impl Into<String>,
        thread_id: impl Into<String>,
        trace_id: impl Into<String>,
    ) -> Self {
        Self {
            agent,
            namespace: namespace.into(),
            conversation_id: conversation_id.into(),
            thread_id: thread_id.into(),
            trace_id: trace_id.into(),
            last_message_id: None,
        }
    }

    /// Run a fresh turn (or the first turn of a new thread).
    pub async fn send(
        &mut self,
        executor: &dyn StepExecutor,
        history: &dyn HistoryStore,
        ctx: RunContext,
        messages: Vec<InputMessage>,
        callback: impl FnMut(&ResponseChunk) + Send,
    ) -> Result<AgentOutput> {
        self.invoke(executor, history, ctx, messages, callback).await
    }

    /// Resume a paused run with a human approval decision.
    pub async fn approve(
        &mut self,
        executor: &dyn StepExecutor,
        history: &dyn HistoryStore,
        ctx: RunContext,
        approved_call_ids: Vec<String>,
        rejected_call_ids: Vec<String>,
        callback: impl FnMut(&ResponseChunk) + Send,
    ) -> Result<AgentOutput> {
        let approval = InputMessage::FunctionCallApprovalResponseMessage {
            approved_call_ids,
            rejected_call_ids,
        };
        self.invoke(executor, history, ctx, vec![approval], callback).await
    }

    async fn invoke(
        &mut self,
        executor: &dyn StepExecutor,
        history: &dyn HistoryStore,
        ctx: RunContext,
        messages: Vec<InputMessage>,
        callback: impl FnMut(&ResponseChunk) + Send,
    ) -> Result<AgentOutput> {
        let input = RunInput {
            messages,
            namespace: self.namespace.clone(),
            conversation_id: self.conversation_id.clone(),
            thread_id: self.thread_id.clone(),
            previous_message_id: self.last_message_id.clone(),
            trace_id: self.trace_id.clone(),
        };
        let output = self.agent.run(executor, history, ctx, input, callback).await?;
        self.last_message_id = Some(output.run_id.clone());
        Ok(output)
    }
}
