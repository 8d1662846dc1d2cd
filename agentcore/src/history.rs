//! The conversation-run manager (C3): a per-run view over a thread of
//! `ConversationMessage`s, with exactly-once append semantics on resume.
//!
//! Ordering contract: `load_messages` → zero or more `add_messages` → one
//! `save_messages`, per run. Concurrent runs over the same thread are not
//! supported by the core — external serialization is required, matching
//! the spec's explicit non-guarantee.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;
use crate::message::{ConversationMessage, InputMessage, Summary};
use crate::run_state::RunState;
use crate::usage::Usage;

/// The persistence collaborator this crate consumes — the SQL schema and
/// concrete repository are out of scope; only this shape is.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Fetch the persisted prefix of a thread up to and including
    /// `previous_message_id`.
    async fn load_messages(
        &self,
        namespace: &str,
        previous_message_id: &str,
    ) -> Result<Vec<ConversationMessage>>;

    /// Append-or-extend: on `msg_id` conflict, concatenate `messages` and
    /// replace `meta`.
    #[allow(clippy::too_many_arguments)]
    async fn save_messages(
        &self,
        namespace: &str,
        msg_id: &str,
        previous_msg_id: Option<&str>,
        conversation_id: &str,
        messages: &[InputMessage],
        meta: &HashMap<String, serde_json::Value>,
    ) -> Result<()>;

    /// Persist a summary record.
    async fn save_summary(&self, namespace: &str, summary: &Summary) -> Result<()>;

    /// Find the most recent summary for `thread_id` with
    /// `created_at <= target_created_at`, if one exists.
    async fn find_covering_summary(
        &self,
        namespace: &str,
        thread_id: &str,
        target_created_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<Summary>>;
}

/// Summarization policy, fully delegated: the core only respects whatever
/// this trait returns and never inspects token/message/turn counts itself
/// (the summarizer's exact trigger is an open question spec.md explicitly
/// leaves to the implementation).
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Given the full in-memory message list for a run, optionally return a
    /// replacement prefix (a summary message) plus the summary record to
    /// persist on the next save. Returning `None` leaves messages
    /// untouched.
    async fn summarize(&self, messages: &[InputMessage]) -> Result<Option<SummarizationResult>>;
}

/// The outcome of applying a summarizer: the message that replaces the
/// summarized prefix, and the record to persist alongside it.
#[derive(Debug, Clone)]
pub struct SummarizationResult {
    /// The message replacing the summarized prefix.
    pub summary_message: InputMessage,
    /// The summary record to persist on the next `save_messages`.
    pub summary: Summary,
}

/// A `Summarizer` that never summarizes, for agents that don't configure
/// one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSummarizer;

#[async_trait]
impl Summarizer for NoopSummarizer {
    async fn summarize(&self, _messages: &[InputMessage]) -> Result<Option<SummarizationResult>> {
        Ok(None)
    }
}

/// The per-run view over history: loads once, stages appends in memory,
/// and persists them as a single record at the end of the run.
pub struct ConversationRunManager<'a> {
    store: &'a dyn HistoryStore,
    summarizer: &'a dyn Summarizer,
    namespace: String,
    conversation_id: String,
    thread_id: String,
    message_id: String,
    previous_message_id: Option<String>,
    /// Loaded messages tagged with the id of the record they came from (or,
    /// for a resolved covering summary, the cutoff it replaces), so a
    /// later in-run summarization can drop exactly the prefix it covers.
    old_messages: Vec<(String, InputMessage)>,
    new_messages: Vec<InputMessage>,
    tail_meta: HashMap<String, serde_json::Value>,
    loaded: bool,
    pending_summary: Option<SummarizationResult>,
}

impl<'a> ConversationRunManager<'a> {
    /// Build a manager for `namespace`/`conversation_id`/`thread_id`,
    /// starting a run whose record id is `message_id` (advanced by
    /// `save_messages` on completion).
    #[must_use]
    pub fn new(
        store: &'a dyn HistoryStore,
        summarizer: &'a dyn Summarizer,
        namespace: impl Into<String>,
        conversation_id: impl Into<String>,
        thread_id: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            summarizer,
            namespace: namespace.into(),
            conversation_id: conversation_id.into(),
            thread_id: thread_id.into(),
            message_id: message_id.into(),
            previous_message_id: None,
            old_messages: Vec::new(),
            new_messages: Vec::new(),
            tail_meta: HashMap::new(),
            loaded: false,
            pending_summary: None,
        }
    }

    /// Load the persisted prefix up to `previous_message_id`, resolving a
    /// covering summary if one exists and recovering the tail `RunState`
    /// from the loaded tail's metadata. Idempotent: a second call is a
    /// no-op once populated.
    pub async fn load_messages(&mut self, previous_message_id: &str) -> Result<()> {
        if self.loaded {
            return Ok(());
        }

        let records = self
            .store
            .load_messages(&self.namespace, previous_message_id)
            .await?;

        self.previous_message_id = Some(previous_message_id.to_string());

        let Some(tail) = records.last() else {
            self.loaded = true;
            return Ok(());
        };

        self.tail_meta = tail.meta.clone();

        if let Some(covering) = self
            .store
            .find_covering_summary(&self.namespace, &self.thread_id, chrono::Utc::now())
            .await?
        {
            let mut messages = vec![(
                covering.last_summarized_message_id.clone(),
                covering.summary_message.clone(),
            )];
            for record in &records {
                if record.message_id > covering.last_summarized_message_id {
                    messages.extend(
                        record
                            .messages
                            .iter()
                            .cloned()
                            .map(|msg| (record.message_id.clone(), msg)),
                    );
                }
            }
            self.old_messages = messages;
        } else {
            self.old_messages = records
                .into_iter()
                .flat_map(|r| {
                    let id = r.message_id;
                    r.messages.into_iter().map(move |msg| (id.clone(), msg))
                })
                .collect();
        }

        self.loaded = true;
        Ok(())
    }

    /// Reconstruct the tail `RunState`, if any was recorded.
    #[must_use]
    pub fn load_run_state(&self) -> Option<RunState> {
        RunState::load_from_meta(&self.tail_meta)
    }

    /// The reconstructed tail metadata.
    #[must_use]
    pub const fn meta(&self) -> &HashMap<String, serde_json::Value> {
        &self.tail_meta
    }

    /// The current run's record id.
    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Start a new record on top of already-loaded history: used when the
    /// reconstructed tail was absent or `IsComplete`, so this run must not
    /// extend the closed record it just loaded.
    pub fn begin_fresh_run(&mut self, message_id: impl Into<String>) {
        self.message_id = message_id.into();
    }

    /// Messages staged this run but not yet persisted.
    #[must_use]
    pub fn staged_messages(&self) -> &[InputMessage] {
        &self.new_messages
    }

    /// Append messages to the in-memory staging area. Does not touch
    /// storage.
    pub fn add_messages(&mut self, messages: impl IntoIterator<Item = InputMessage>, usage: Usage) {
        let _ = usage; // usage is accumulated on `RunState`, not staged here.
        self.new_messages.extend(messages);
    }

    /// Return `old_messages ++ new_messages`, applying the summarizer first.
    /// If the summarizer returns a replacement, the prefix it covers
    /// (everything tagged with a record id `<= last_summarized_message_id`)
    /// is dropped in favor of `summary_message`, and the replacement is
    /// recorded as pending: the next `save_messages` persists the summary
    /// record and clears the pending flag.
    pub async fn get_messages(&mut self) -> Result<Vec<InputMessage>> {
        let combined: Vec<(String, InputMessage)> = self
            .old_messages
            .iter()
            .cloned()
            .chain(
                self.new_messages
                    .iter()
                    .cloned()
                    .map(|msg| (self.message_id.clone(), msg)),
            )
            .collect();

        let plain: Vec<InputMessage> = combined.iter().map(|(_, msg)| msg.clone()).collect();

        if let Some(result) = self.summarizer.summarize(&plain).await? {
            let cutoff = result.summary.last_summarized_message_id.clone();
            let mut replaced = vec![result.summary_message.clone()];
            replaced.extend(
                combined
                    .into_iter()
                    .filter_map(|(id, msg)| (id > cutoff).then_some(msg)),
            );
            self.pending_summary = Some(result);
            Ok(replaced)
        } else {
            Ok(plain)
        }
    }

    /// Persist `new_messages` as a single `ConversationMessage`. If
    /// `meta`'s embedded `RunState` is complete, the next run starts a
    /// fresh record id; otherwise the same id is reused and the store
    /// performs array-append-on-conflict.
    pub async fn save_messages(
        &mut self,
        run_state: &RunState,
        trace_id: &str,
    ) -> Result<()> {
        let mut meta = HashMap::new();
        meta.insert(
            ConversationMessage::META_RUN_STATE.to_string(),
            run_state.to_meta_value(),
        );
        meta.insert(
            ConversationMessage::META_TRACE_ID.to_string(),
            serde_json::Value::String(trace_id.to_string()),
        );
        meta.insert(
            ConversationMessage::META_USAGE.to_string(),
            serde_json::to_value(run_state.usage).unwrap_or(serde_json::Value::Null),
        );

        self.store
            .save_messages(
                &self.namespace,
                &self.message_id,
                self.previous_message_id.as_deref(),
                &self.conversation_id,
                &self.new_messages,
                &meta,
            )
            .await?;

        if let Some(result) = self.pending_summary.take() {
            self.store.save_summary(&self.namespace, &result.summary).await?;
        }

        if run_state.is_complete() {
            self.previous_message_id = Some(self.message_id.clone());
            self.message_id = uuid::Uuid::new_v4().to_string();
        }

        self.new_messages.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConversationRunManager, HistoryStore, NoopSummarizer};
    use crate::message::{ConversationMessage, InputMessage, Summary};
    use crate::run_state::RunState;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        records: Mutex<Vec<ConversationMessage>>,
    }

    #[async_trait]
    impl HistoryStore for FakeStore {
        async fn load_messages(
            &self,
            _namespace: &str,
            _previous_message_id: &str,
        ) -> crate::error::Result<Vec<ConversationMessage>> {
            Ok(self.records.lock().expect("lock").clone())
        }

        async fn save_messages(
            &self,
            _namespace: &str,
            msg_id: &str,
            _previous_msg_id: Option<&str>,
            conversation_id: &str,
            messages: &[InputMessage],
            meta: &HashMap<String, serde_json::Value>,
        ) -> crate::error::Result<()> {
            let mut records = self.records.lock().expect("lock");
            if let Some(existing) = records.iter_mut().find(|r| r.message_id == msg_id) {
                existing.messages.extend(messages.iter().cloned());
                existing.meta = meta.clone();
            } else {
                records.push(ConversationMessage {
                    message_id: msg_id.to_string(),
                    thread_id: "thread-1".to_string(),
                    conversation_id: conversation_id.to_string(),
                    messages: messages.to_vec(),
                    meta: meta.clone(),
                });
            }
            Ok(())
        }

        async fn save_summary(&self, _namespace: &str, _summary: &Summary) -> crate::error::Result<()> {
            Ok(())
        }

        async fn find_covering_summary(
            &self,
            _namespace: &str,
            _thread_id: &str,
            _target_created_at: chrono::DateTime<chrono::Utc>,
        ) -> crate::error::Result<Option<Summary>> {
            Ok(None)
        }
    }

    struct AlwaysSummarize {
        cutoff: String,
    }

    #[async_trait]
    impl Summarizer for AlwaysSummarize {
        async fn summarize(&self, _messages: &[InputMessage]) -> crate::error::Result<Option<SummarizationResult>> {
            Ok(Some(SummarizationResult {
                summary_message: InputMessage::assistant("summary"),
                summary: Summary {
                    summary_id: "sum-1".to_string(),
                    thread_id: "thread-1".to_string(),
                    summary_message: InputMessage::assistant("summary"),
                    last_summarized_message_id: self.cutoff.clone(),
                    meta: HashMap::new(),
                    created_at: chrono::DateTime::from_timestamp(0, 0).expect("valid timestamp"),
                },
            }))
        }
    }

    #[tokio::test]
    async fn get_messages_drops_the_prefix_the_summary_covers() {
        let store = FakeStore::default();
        store.records.lock().expect("lock").push(ConversationMessage {
            message_id: "rec-1".to_string(),
            thread_id: "thread-1".to_string(),
            conversation_id: "conv-1".to_string(),
            messages: vec![InputMessage::user("old context")],
            meta: HashMap::new(),
        });
        let summarizer = AlwaysSummarize {
            cutoff: "rec-1".to_string(),
        };
        let mut manager = ConversationRunManager::new(
            &store,
            &summarizer,
            "ns",
            "conv-1",
            "thread-1",
            "run-2",
        );
        manager.load_messages("rec-1").await.expect("load");
        manager.add_messages([InputMessage::user("new turn")], crate::usage::Usage::zero());

        let messages = manager.get_messages().await.expect("get");

        assert_eq!(messages.len(), 2);
        match &messages[0] {
            InputMessage::OutputMessage { content } => assert_eq!(content, "summary"),
            other => panic!("expected the summary message first, got {other:?}"),
        }
        assert!(
            !messages.iter().any(|m| matches!(m, InputMessage::UserMessage { content } if content == "old context")),
            "summarized prefix should have been dropped, got {messages:?}"
        );
    }

    #[tokio::test]
    async fn save_then_reuse_id_until_complete() {
        let store = FakeStore::default();
        let summarizer = NoopSummarizer;
        let mut manager = ConversationRunManager::new(
            &store,
            &summarizer,
            "ns",
            "conv-1",
            "thread-1",
            "run-1",
        );
        manager.load_messages("prev").await.expect("load");

        manager.add_messages([InputMessage::user("hi")], crate::usage::Usage::zero());
        assert_eq!(manager.get_messages().await.expect("get").len(), 1);

        let mut running = RunState::new();
        running.transition_to_execute_tools(vec![]);
        manager.save_messages(&running, "trace-1").await.expect("save");
        assert_eq!(manager.message_id(), "run-1");

        let mut complete = RunState::new();
        complete.transition_to_complete();
        manager.save_messages(&complete, "trace-1").await.expect("save complete");
        assert_ne!(manager.message_id(), "run-1");
    }
}
