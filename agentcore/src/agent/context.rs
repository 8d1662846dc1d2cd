//! Per-run context threaded through tool calls, the system-prompt
//! provider, and MCP toolset resolution — the `runContext` named
//! throughout §4.5 and §6.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::usage::Usage;

/// Read-only (mostly) context for a single run, available to tools, the
/// system-prompt provider, and MCP toolsets.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    /// Identifier of the current run.
    pub run_id: String,
    /// Name of the agent executing this run.
    pub agent_name: String,
    /// Current loop iteration.
    pub loop_iteration: u64,
    /// Usage accumulated so far in this run.
    pub usage: Usage,
    /// Arbitrary caller-supplied state, surfaced verbatim to tools and
    /// prompt templating (e.g. tenant id, user id).
    pub state: HashMap<String, serde_json::Value>,
    /// In-process cancellation flag, checked alongside the durable
    /// `cancelled` key at every iteration boundary. Only meaningful under
    /// the *Local* runtime strategy — a Restate-like or Temporal-like
    /// strategy observes cancellation exclusively through its executor.
    pub cancellation: Option<CancellationToken>,
}

impl RunContext {
    /// Build a fresh context for a run.
    #[must_use]
    pub fn new(run_id: impl Into<String>, agent_name: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            agent_name: agent_name.into(),
            loop_iteration: 0,
            usage: Usage::zero(),
            state: HashMap::new(),
            cancellation: None,
        }
    }

    /// Attach arbitrary state, builder-style.
    #[must_use]
    pub fn with_state(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.state.insert(key.into(), value);
        self
    }

    /// Attach a cancellation token, builder-style.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// A cooperative, in-process cancellation flag for the *Local* runtime
/// strategy. Cloning shares the same underlying flag — the caller holds one
/// clone and flips it from outside the run, the Agent Loop holds another and
/// checks it at the same iteration boundaries as the durable `cancelled`
/// key (§5).
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Build a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Request cancellation. Observed by the Agent Loop at its next
    /// iteration boundary, not immediately.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::CancellationToken;

    #[test]
    fn cloned_tokens_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
