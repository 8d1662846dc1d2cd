//! The durable step abstraction (C1): a uniform checkpoint boundary that is
//! usable in-process with no persistence, or backed by a workflow engine.
//!
//! The future passed to a step must be deterministic modulo its return value
//! — all non-determinism (time, uuid, randomness, network) must happen
//! inside the step so a durable backend captures it alongside the result.
//! Callers must never branch on wall-clock time outside a step.
//!
//! [`StepExecutor`] itself only ever deals in `serde_json::Value` so it
//! stays object-safe — the Agent Loop holds it as `Arc<dyn StepExecutor>`
//! and swaps Local/Restate-like/Temporal-like implementations underneath
//! without the call sites caring. [`run`] is the typed helper call sites
//! actually use; it serializes on the way in and deserializes on the way
//! out.
//!
//! # Step naming discipline
//!
//! Names used by the Agent Loop are deterministic and unique per logical
//! step so a durable backend can key checkpoints by them:
//! - `llm-call-{iteration}` — one per LLM round trip.
//! - `tool-{id}-{name}` — one per tool invocation.
//! - `load-messages`, `load-instruction`, `save-messages-paused`,
//!   `save-messages-complete`, `generate-message-id`.
//! - `emit-run-created`, `emit-run-in-progress`, `emit-run-paused`,
//!   `emit-run-completed`, `emit-tool-result-{call_id}`.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use std::pin::Pin;

use crate::error::{AgentCoreError, Result};

/// A boxed future tied to the lifetime of whatever it borrows, the shape
/// [`run`] needs since the wrapped closure is typically an async block
/// capturing borrowed request state.
pub type StepFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Memoizes effectful calls against a named checkpoint. Object-safe: every
/// method trades in `serde_json::Value`, never a generic type parameter, so
/// the Agent Loop can hold one implementation behind `Arc<dyn StepExecutor>`
/// and swap it per runtime strategy.
///
/// Implementations: [`NoopExecutor`] (direct invocation, no persistence) and
/// a durable implementation bound to a workflow engine's context (not
/// provided by this crate — see the *Restate-like* and *Temporal-like*
/// runtime strategies on [`crate::agent::loop_exec`]).
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Run `make` under at-most-once-observable semantics keyed by `name`,
    /// committing its serialized result.
    ///
    /// A durable implementation returns the previously committed value
    /// without invoking `make` again if `name` was already checkpointed in
    /// the enclosing workflow scope; otherwise it invokes `make`, commits
    /// `(name -> result)` atomically, then returns the result. If `make`
    /// errors, nothing is committed and the error propagates. Callers
    /// should use [`run`] rather than this directly.
    async fn run_value(
        &self,
        name: &str,
        make: Box<dyn FnOnce() -> StepFuture<'_, serde_json::Value> + Send + '_>,
    ) -> Result<serde_json::Value>;

    /// Set an ad-hoc durable key, used for out-of-band signals such as
    /// cancellation.
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()>;

    /// Fetch an ad-hoc durable key, returning `None` if it was never set.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Force-commit a checkpoint with no associated value, for steps whose
    /// only observable effect is "did this already happen" (event emission
    /// being the main case). Returns `true` the first time `name` is
    /// committed and `false` on every subsequent call (including after a
    /// resume), so callers can skip a side effect — like forwarding a chunk
    /// to the subscriber — that must not be observed twice on replay.
    async fn checkpoint(&self, name: &str) -> Result<bool>;
}

/// Run `fut` memoized under `name`, serializing its result through
/// [`StepExecutor::run_value`]. This is the call site API; `run_value`
/// itself stays untyped so the trait remains object-safe.
pub async fn run<T, Fut>(executor: &dyn StepExecutor, name: &str, fut: Fut) -> Result<T>
where
    T: Serialize + DeserializeOwned + Send,
    Fut: Future<Output = Result<T>> + Send,
{
    let make: Box<dyn FnOnce() -> StepFuture<'_, serde_json::Value> + Send + '_> =
        Box::new(move || {
            Box::pin(async move {
                let value = fut.await?;
                serde_json::to_value(value).map_err(AgentCoreError::from)
            })
        });
    let value = executor.run_value(name, make).await?;
    serde_json::from_value(value).map_err(AgentCoreError::from)
}

/// The no-op implementation: invokes the step directly and persists
/// nothing. This is what the *Local* runtime strategy uses — a crash
/// mid-run simply loses the run, there is nothing to resume.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExecutor;

#[async_trait]
impl StepExecutor for NoopExecutor {
    async fn run_value(
        &self,
        name: &str,
        make: Box<dyn FnOnce() -> StepFuture<'_, serde_json::Value> + Send + '_>,
    ) -> Result<serde_json::Value> {
        make().await.map_err(|err| match err {
            AgentCoreError::Step { .. } => err,
            other => AgentCoreError::step(name, other.to_string()),
        })
    }

    async fn set(&self, _key: &str, _value: serde_json::Value) -> Result<()> {
        Ok(())
    }

    async fn get(&self, _key: &str) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }

    async fn checkpoint(&self, _name: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Build the deterministic name for an LLM round trip.
#[must_use]
pub fn llm_call_step(iteration: usize) -> String {
    format!("llm-call-{iteration}")
}

/// Build the deterministic name for a single tool invocation, keyed by the
/// output item's `id` (not the call-correlation `call_id` — see
/// `emit_tool_result_step` for the one keyed by `call_id`).
#[must_use]
pub fn tool_step(id: &str, name: &str) -> String {
    format!("tool-{id}-{name}")
}

/// Build the deterministic name for a tool-result emission.
#[must_use]
pub fn emit_tool_result_step(call_id: &str) -> String {
    format!("emit-tool-result-{call_id}")
}

#[cfg(test)]
mod tests {
    use super::{NoopExecutor, StepExecutor, run};
    use crate::error::AgentCoreError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn noop_executor_invokes_every_time() {
        let executor = NoopExecutor;
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            let result: i32 = run(&executor, "step-a", async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            })
            .await
            .expect("step succeeds");
            assert_eq!(result, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn noop_executor_propagates_errors() {
        let executor = NoopExecutor;
        let result: Result<i32, _> =
            run(&executor, "step-b", async move { Err(AgentCoreError::llm("boom")) }).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn ad_hoc_keys_are_not_persisted_under_noop() {
        let executor = NoopExecutor;
        executor
            .set("cancelled", serde_json::Value::Bool(true))
            .await
            .expect("set succeeds");
        assert_eq!(executor.get("cancelled").await.expect("get succeeds"), None);
    }

    #[tokio::test]
    async fn checkpoint_reports_first_commit_under_noop() {
        let executor = NoopExecutor;
        assert!(executor.checkpoint("emit-run-created").await.expect("checkpoint"));
        assert!(executor.checkpoint("emit-run-created").await.expect("checkpoint"));
    }
}
