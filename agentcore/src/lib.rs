//! `agentcore` — the durable execution core of a multi-provider LLM agent
//! framework.
//!
//! Given a user message, a language-model backend, a set of callable tools,
//! and a conversation history store, this crate drives a bounded iterative
//! loop that alternates between invoking an LLM and executing the tool calls
//! it requests — including human-in-the-loop approval gating — until the
//! model produces a final answer or the loop bound is exceeded. Every
//! side-effecting step is expressed as an idempotent, re-playable step
//! through the [`step`] module so that, under a pluggable durable executor,
//! a crashed run resumes from its last completed step without repeating
//! prior effects.
//!
//! LLM wire protocols, the HTTP gateway, MCP transport, prompt-template
//! storage, and the concrete workflow engine are external collaborators —
//! this crate only names the interfaces it consumes from them.
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod agent;
pub mod broker;
pub mod error;
pub mod history;
pub mod message;
pub mod registry;
pub mod run_state;
pub mod step;
pub mod stream;
pub mod usage;

#[cfg(any(test, feature = "experimental"))]
pub mod testing;

pub use agent::{Agent, AgentConfig, AgentOutput, RunStatus};
pub use error::{AgentCoreError, Result};
pub use message::{ConversationMessage, InputMessage, Summary, Thread, ToolCall};
pub use run_state::{CurrentStep, RunState};
pub use stream::{Response, ResponseChunk};
pub use usage::Usage;
