//! The agent run state machine (C2): tagged state, accumulated usage, and
//! pending/awaiting tool queues, round-tripped through conversation
//! metadata.
//!
//! ```text
//!          new / resume-fresh
//!                 │
//!                 ▼
//!           ┌─CallLLM─┐
//!           │         │
//!   all-immediate     mix / only-approval
//!           │         │
//!           ▼         ▼
//!     ExecuteTools  AwaitApproval ──(approval msg)──► ExecuteTools
//!           │                                          │
//!           ▼                                          ▼
//!    (awaiting empty?)──no──► AwaitApproval     (same path)
//!           │yes
//!           ▼
//!        CallLLM (next iter) ──(no tool calls)──► Complete
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::message::ToolCall;
use crate::usage::Usage;

/// The tagged step a `RunState` currently occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrentStep {
    /// About to invoke (or currently invoking) the LLM.
    CallLlm,
    /// Executing the tool calls in `pending_tool_calls`.
    ExecuteTools,
    /// Paused, waiting for a human approval response.
    AwaitApproval,
    /// The run has produced a final answer.
    Complete,
}

/// The run's mutable state machine. Reconstructed from the tail message's
/// metadata on resume; mutated only by the Agent Loop on a single
/// cooperative thread; serialized back into conversation metadata whenever
/// the loop pauses or completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// The current step.
    pub current_step: CurrentStep,
    /// Incremented exactly once per LLM-call completion.
    pub loop_iteration: u64,
    /// Tool calls scheduled for immediate execution in the current
    /// iteration.
    pub pending_tool_calls: Vec<ToolCall>,
    /// Approval-required tool calls deferred while immediate tools in the
    /// same iteration run; ephemeral — not meaningful once a run
    /// terminates normally (see design notes on approval queueing).
    pub tools_awaiting_approval: Vec<ToolCall>,
    /// Monotonically accumulated token usage for this run.
    pub usage: Usage,
}

impl RunState {
    /// A fresh run: `CallLlm`, iteration zero, empty queues, zero usage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current_step: CurrentStep::CallLlm,
            loop_iteration: 0,
            pending_tool_calls: Vec::new(),
            tools_awaiting_approval: Vec::new(),
            usage: Usage::zero(),
        }
    }

    /// Reconstruct a `RunState` from persisted message metadata. Returns
    /// `None` when no `run_state` key is present (a fresh thread) or the
    /// value fails to parse as a `RunState` (treated identically to
    /// absent, preserving forward progress).
    #[must_use]
    pub fn load_from_meta(meta: &HashMap<String, serde_json::Value>) -> Option<Self> {
        meta.get(crate::ConversationMessage::META_RUN_STATE)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Serialize this state for embedding under `meta.run_state`.
    ///
    /// `trace_id` is threaded through separately (`meta.trace_id`) rather
    /// than folded into this value, matching the persisted metadata key
    /// schema.
    #[must_use]
    pub fn to_meta_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// `current_step == Complete`.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self.current_step, CurrentStep::Complete)
    }

    /// `current_step == AwaitApproval`.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        matches!(self.current_step, CurrentStep::AwaitApproval)
    }

    /// Move to `ExecuteTools` with the given immediate tool calls.
    pub fn transition_to_execute_tools(&mut self, tool_calls: Vec<ToolCall>) {
        self.current_step = CurrentStep::ExecuteTools;
        self.pending_tool_calls = tool_calls;
    }

    /// Move to `AwaitApproval` with the given approval-required tool calls.
    pub fn transition_to_await_approval(&mut self, tool_calls: Vec<ToolCall>) {
        self.current_step = CurrentStep::AwaitApproval;
        self.pending_tool_calls = tool_calls;
    }

    /// Move to `CallLlm`, incrementing `loop_iteration`.
    pub fn transition_to_llm(&mut self) {
        self.current_step = CurrentStep::CallLlm;
        self.loop_iteration += 1;
    }

    /// Move to `Complete`.
    pub fn transition_to_complete(&mut self) {
        self.current_step = CurrentStep::Complete;
    }

    /// Clear `pending_tool_calls` after `ExecuteTools` finishes its pass.
    pub fn clear_pending_tools(&mut self) {
        self.pending_tool_calls.clear();
    }

    /// Move the queued approval-required tools into `pending_tool_calls`
    /// and transition to `AwaitApproval`.
    pub fn promote_awaiting_to_approval(&mut self) {
        self.pending_tool_calls = std::mem::take(&mut self.tools_awaiting_approval);
        self.current_step = CurrentStep::AwaitApproval;
    }

    /// Accumulate usage observed from one LLM call.
    pub fn accumulate_usage(&mut self, usage: Usage) {
        self.usage += usage;
    }

    /// `pending_tool_calls` and `tools_awaiting_approval` are both empty —
    /// required to hold whenever `current_step` is `CallLlm` or `Complete`.
    #[must_use]
    pub fn queues_empty(&self) -> bool {
        self.pending_tool_calls.is_empty() && self.tools_awaiting_approval.is_empty()
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{CurrentStep, RunState};
    use crate::message::ToolCall;
    use std::collections::HashMap;

    fn call(id: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            call_id: id.into(),
            name: "get_user".into(),
            arguments: "{}".into(),
            thought_signature: None,
        }
    }

    #[test]
    fn new_state_has_expected_defaults() {
        let state = RunState::new();
        assert_eq!(state.current_step, CurrentStep::CallLlm);
        assert_eq!(state.loop_iteration, 0);
        assert!(state.queues_empty());
        assert!(state.usage.is_empty());
    }

    #[test]
    fn round_trips_through_meta() {
        let mut state = RunState::new();
        state.transition_to_execute_tools(vec![call("c1")]);

        let mut meta = HashMap::new();
        meta.insert(
            crate::ConversationMessage::META_RUN_STATE.to_string(),
            state.to_meta_value(),
        );

        let reloaded = RunState::load_from_meta(&meta).expect("round trip");
        assert_eq!(reloaded.current_step, state.current_step);
        assert_eq!(reloaded.pending_tool_calls, state.pending_tool_calls);
    }

    #[test]
    fn missing_run_state_key_yields_none() {
        assert!(RunState::load_from_meta(&HashMap::new()).is_none());
    }

    #[test]
    fn mixed_partition_then_promote_awaiting() {
        let mut state = RunState::new();
        state.pending_tool_calls = vec![call("immediate")];
        state.tools_awaiting_approval = vec![call("needs-approval")];
        state.current_step = CurrentStep::ExecuteTools;

        state.clear_pending_tools();
        assert!(state.pending_tool_calls.is_empty());

        state.promote_awaiting_to_approval();
        assert_eq!(state.current_step, CurrentStep::AwaitApproval);
        assert_eq!(state.pending_tool_calls.len(), 1);
        assert!(state.tools_awaiting_approval.is_empty());
    }

    #[test]
    fn transition_to_llm_increments_iteration() {
        let mut state = RunState::new();
        state.transition_to_llm();
        state.transition_to_llm();
        assert_eq!(state.loop_iteration, 2);
        assert_eq!(state.current_step, CurrentStep::CallLlm);
    }
}
