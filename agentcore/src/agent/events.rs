//! The run lifecycle chunks the Agent Loop emits in addition to model
//! chunks (§6 "Run lifecycle chunks (produced)").

use serde_json::json;

use crate::message::ToolCall;
use crate::stream::ResponseChunk;
use crate::usage::Usage;

/// `run.created {id, traceID}` — emitted once per fresh run.
#[must_use]
pub fn run_created(run_id: &str, trace_id: &str) -> ResponseChunk {
    ResponseChunk::RunLifecycle {
        name: "run.created".to_string(),
        payload: json!({ "id": run_id, "trace_id": trace_id }),
    }
}

/// `run.in_progress {id, traceID}` — emitted once after load/reconstruct.
#[must_use]
pub fn run_in_progress(run_id: &str, trace_id: &str) -> ResponseChunk {
    ResponseChunk::RunLifecycle {
        name: "run.in_progress".to_string(),
        payload: json!({ "id": run_id, "trace_id": trace_id }),
    }
}

/// `run.paused {id, pendingToolCalls, usage, traceID}`.
#[must_use]
pub fn run_paused(run_id: &str, pending: &[ToolCall], usage: Usage, trace_id: &str) -> ResponseChunk {
    ResponseChunk::RunLifecycle {
        name: "run.paused".to_string(),
        payload: json!({
            "id": run_id,
            "pending_tool_calls": pending,
            "usage": usage,
            "trace_id": trace_id,
        }),
    }
}

/// `run.completed {id, usage, traceID}`.
#[must_use]
pub fn run_completed(run_id: &str, usage: Usage, trace_id: &str) -> ResponseChunk {
    ResponseChunk::RunLifecycle {
        name: "run.completed".to_string(),
        payload: json!({ "id": run_id, "usage": usage, "trace_id": trace_id }),
    }
}
