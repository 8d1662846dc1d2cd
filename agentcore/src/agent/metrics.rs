//! Optional per-run step history attached to [`super::AgentOutput`] for
//! diagnostics. This is additive observability data, not a new control
//! path: it is reconstructed fresh from the in-memory loop on every run and
//! never folds into the persisted `RunState` (see [`crate::run_state`]).

use crate::message::ToolCall;
use crate::usage::Usage;

/// One `CallLlm` iteration's observable summary: what the LLM call
/// produced and which tools it triggered.
#[derive(Debug, Clone, Default)]
pub struct StepInfo {
    /// The `RunState::loop_iteration` this step corresponds to.
    pub loop_iteration: u64,
    /// Assistant text produced by this iteration's LLM call, if any.
    pub assistant_text: Option<String>,
    /// Tool calls requested by this iteration's LLM call, in response
    /// order.
    pub tool_calls: Vec<ToolCall>,
    /// Usage reported by this iteration's LLM call alone (not the run's
    /// running total).
    pub usage: Usage,
}
