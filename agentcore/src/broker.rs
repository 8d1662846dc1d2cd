//! The cross-process streaming fan-out capability used when the Agent Loop
//! is relocated into a durable workflow: direct function-pointer callbacks
//! cannot cross a workflow boundary, so durable executors `Publish` chunks
//! here and an ingress process `Subscribe`s by `run_id` and forwards them
//! to its own local callback.
//!
//! The broker guarantees monotonic per-run ordering; it does not guarantee
//! replay on subscriber disconnect — a subscriber that attaches after
//! chunks were already published misses them, matching the spec's explicit
//! non-guarantee.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{AgentCoreError, Result};
use crate::stream::ResponseChunk;

/// Publish/subscribe rendezvous keyed by `run_id`.
#[async_trait]
pub trait StreamBroker: Send + Sync {
    /// Publish one chunk for `run_id`, in the order it was produced.
    async fn publish(&self, run_id: &str, chunk: ResponseChunk) -> Result<()>;

    /// Subscribe to the channel for `run_id`, creating it if absent.
    /// Returns a receiving half the ingress side drains and forwards to its
    /// local callback.
    async fn subscribe(&self, run_id: &str) -> Result<mpsc::Receiver<ResponseChunk>>;

    /// Close the channel for `run_id`; further `publish` calls for it fail.
    /// Called by the workflow side once a run reaches a terminal state
    /// (paused or completed).
    async fn close(&self, run_id: &str) -> Result<()>;
}

/// A process-wide, in-memory broker: a concurrent map from `run_id` to a
/// bounded channel. This is the reference implementation named in the
/// design notes ("a concurrent map from runID to a bounded buffered channel
/// ... closed by the workflow on completion"); a cross-process deployment
/// would back this with a message bus instead, behind the same trait.
pub struct InMemoryStreamBroker {
    channels: DashMap<String, mpsc::Sender<ResponseChunk>>,
    capacity: usize,
}

impl InMemoryStreamBroker {
    /// Build a broker whose per-run channels buffer up to `capacity`
    /// chunks before a publisher blocks.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    /// Wrap this broker in an `Arc`, the shape the process-wide shared
    /// resource is held as (see [`crate::registry`]).
    #[must_use]
    pub fn shared(capacity: usize) -> Arc<Self> {
        Arc::new(Self::new(capacity))
    }
}

impl Default for InMemoryStreamBroker {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl StreamBroker for InMemoryStreamBroker {
    async fn publish(&self, run_id: &str, chunk: ResponseChunk) -> Result<()> {
        let sender = self
            .channels
            .get(run_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AgentCoreError::history(format!("no subscriber for run {run_id}")))?;
        sender
            .send(chunk)
            .await
            .map_err(|_| AgentCoreError::history(format!("stream closed for run {run_id}")))
    }

    async fn subscribe(&self, run_id: &str) -> Result<mpsc::Receiver<ResponseChunk>> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.channels.insert(run_id.to_string(), tx);
        Ok(rx)
    }

    async fn close(&self, run_id: &str) -> Result<()> {
        self.channels.remove(run_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemoryStreamBroker, StreamBroker};
    use crate::stream::ResponseChunk;

    #[tokio::test]
    async fn subscribe_then_publish_delivers_in_order() {
        let broker = InMemoryStreamBroker::new(8);
        let mut rx = broker.subscribe("run-1").await.expect("subscribe");

        broker
            .publish(
                "run-1",
                ResponseChunk::RunLifecycle {
                    name: "run.created".into(),
                    payload: serde_json::json!({}),
                },
            )
            .await
            .expect("publish 1");
        broker
            .publish(
                "run-1",
                ResponseChunk::RunLifecycle {
                    name: "run.completed".into(),
                    payload: serde_json::json!({}),
                },
            )
            .await
            .expect("publish 2");

        let first = rx.recv().await.expect("first chunk");
        let second = rx.recv().await.expect("second chunk");
        match (first, second) {
            (
                ResponseChunk::RunLifecycle { name: n1, .. },
                ResponseChunk::RunLifecycle { name: n2, .. },
            ) => {
                assert_eq!(n1, "run.created");
                assert_eq!(n2, "run.completed");
            }
            _ => panic!("unexpected chunk kinds"),
        }
    }

    #[tokio::test]
    async fn close_drops_the_channel() {
        let broker = InMemoryStreamBroker::new(8);
        let _rx = broker.subscribe("run-2").await.expect("subscribe");
        broker.close("run-2").await.expect("close");
        assert!(broker.publish("run-2", dummy_chunk()).await.is_err());
    }

    fn dummy_chunk() -> ResponseChunk {
        ResponseChunk::RunLifecycle {
            name: "run.created".into(),
            payload: serde_json::json!({}),
        }
    }
}
