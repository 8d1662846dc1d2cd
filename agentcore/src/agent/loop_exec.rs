//! The Agent Loop (C5): orchestrates the step executor, run state machine,
//! conversation run manager, and streaming accumulator into the bounded
//! iterative loop described by the crate's state diagram (see
//! [`crate::run_state`]).
//!
//! This module implements the loop body only. The three interchangeable
//! runtime strategies — Local (no-op executor, direct callback), a
//! Restate-like durable executor bound to a workflow context with an
//! ingress process subscribing the stream broker, and a Temporal-like
//! executor where every step is an Activity — all drive [`run_agent`]
//! identically; they differ only in which [`StepExecutor`] and callback
//! they hand it.

use std::sync::Arc;

use tracing::warn;

use crate::error::{AgentCoreError, Result};
use crate::history::{ConversationRunManager, HistoryStore};
use crate::message::{InputMessage, ToolCall};
use crate::run_state::{CurrentStep, RunState};
use crate::step::{self, StepExecutor};
use crate::stream::{self, Response, ResponseChunk};
use crate::usage::Usage;

use super::config::AgentConfig;
use super::context::RunContext;
use super::events;
use super::llm::{Request, RequestInput};
use super::metrics::StepInfo;
use super::prompt;
use super::tool::{Tool, ToolUnion};
use super::{AgentOutput, RunStatus};

/// Everything the Agent Loop needs about the run being started or resumed,
/// beyond the immutable [`AgentConfig`].
#[derive(Debug, Clone)]
pub struct RunInput {
    /// New messages to process. On a fresh run these are the user's turn;
    /// on resume from `AwaitApproval` the first element must be a
    /// [`InputMessage::FunctionCallApprovalResponseMessage`].
    pub messages: Vec<InputMessage>,
    /// Storage partition the history store keys records under.
    pub namespace: String,
    /// The conversation this run's thread belongs to.
    pub conversation_id: String,
    /// The thread this run appends to.
    pub thread_id: String,
    /// Id of the last record written to this thread, if any. `None` starts
    /// a brand new thread.
    pub previous_message_id: Option<String>,
    /// Root trace id threaded into every emitted lifecycle chunk and
    /// persisted metadata.
    pub trace_id: String,
}

struct ResolvedTools<'a> {
    static_tools: &'a [Box<dyn Tool>],
    dynamic_tools: Vec<Box<dyn Tool>>,
}

impl<'a> ResolvedTools<'a> {
    fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.static_tools
            .iter()
            .find(|tool| tool.name() == name)
            .map(AsRef::as_ref)
            .or_else(|| {
                self.dynamic_tools
                    .iter()
                    .find(|tool| tool.name() == name)
                    .map(AsRef::as_ref)
            })
    }

    fn definitions(&self) -> Vec<ToolUnion> {
        self.static_tools
            .iter()
            .map(|tool| tool.definition())
            .chain(self.dynamic_tools.iter().map(|tool| tool.definition()))
            .collect()
    }
}

/// Run (or resume) one agent invocation to completion or pause.
///
/// `callback` receives every model chunk, run-lifecycle chunk, and tool
/// output chunk produced during this call, in source order. Under a durable
/// executor, chunks produced by a step that is replayed from a prior
/// checkpoint are *not* re-delivered — the replayed step returns its
/// committed value without invoking the closure that calls `callback` at
/// all.
pub async fn run_agent(
    config: &AgentConfig,
    executor: &dyn StepExecutor,
    history: &dyn HistoryStore,
    mut ctx: RunContext,
    input: RunInput,
    mut callback: impl FnMut(&ResponseChunk) + Send,
) -> Result<AgentOutput> {
    let mut dynamic_tools = Vec::new();
    for toolset in &config.mcp_servers {
        dynamic_tools.extend(toolset.list_tools(&ctx).await?);
    }
    let resolved = ResolvedTools {
        static_tools: &config.tools,
        dynamic_tools,
    };
    let tool_definitions = resolved.definitions();

    let mut manager = ConversationRunManager::new(
        history,
        config.summarizer.as_ref(),
        &input.namespace,
        &input.conversation_id,
        &input.thread_id,
        input.previous_message_id.clone().unwrap_or_default(),
    );

    if let Some(previous_id) = input.previous_message_id.clone() {
        step::run(executor, "load-messages", async {
            manager.load_messages(&previous_id).await
        })
        .await?;
    }

    let tail_state = manager.load_run_state();
    let mut rejected_call_ids: Option<Vec<String>> = None;

    let mut run_state = match tail_state {
        None => {
            let fresh_id = step::run(executor, "generate-message-id", async {
                Ok(uuid::Uuid::new_v4().to_string())
            })
            .await?;
            manager.begin_fresh_run(fresh_id);
            manager.add_messages(input.messages.clone(), Usage::zero());
            RunState::new()
        }
        Some(state) if state.is_complete() => {
            let fresh_id = step::run(executor, "generate-message-id", async {
                Ok(uuid::Uuid::new_v4().to_string())
            })
            .await?;
            manager.begin_fresh_run(fresh_id);
            manager.add_messages(input.messages.clone(), Usage::zero());
            RunState::new()
        }
        Some(mut state) if state.is_paused() => {
            let Some(InputMessage::FunctionCallApprovalResponseMessage {
                rejected_call_ids: rejected,
                ..
            }) = input.messages.first()
            else {
                return Err(AgentCoreError::InvalidResume);
            };
            rejected_call_ids = Some(rejected.clone());
            state.current_step = CurrentStep::ExecuteTools;
            state
        }
        Some(_) => return Err(AgentCoreError::InvalidResume),
    };

    ctx.run_id = manager.message_id().to_string();

    if executor.checkpoint("emit-run-created").await? {
        callback(&events::run_created(&ctx.run_id, &input.trace_id));
    }
    if executor.checkpoint("emit-run-in-progress").await? {
        callback(&events::run_in_progress(&ctx.run_id, &input.trace_id));
    }

    let instruction = step::run(executor, "load-instruction", async {
        Ok(prompt::resolve_instruction(config.instruction.as_deref(), &ctx).await)
    })
    .await?;

    let mut parameters = config.parameters.clone();
    if let Some(schema) = &config.output_schema {
        parameters.insert(
            "response_format".to_string(),
            serde_json::to_value(schema)?,
        );
    }

    let mut step_history: Vec<StepInfo> = Vec::new();

    loop {
        let durable_cancelled = executor
            .get("cancelled")
            .await?
            .and_then(|value| value.as_bool())
            .unwrap_or(false);
        let local_cancelled = ctx
            .cancellation
            .as_ref()
            .is_some_and(super::context::CancellationToken::is_cancelled);
        if durable_cancelled || local_cancelled {
            return Err(AgentCoreError::Cancelled {
                reason: "cancellation requested".to_string(),
            });
        }

        ctx.loop_iteration = run_state.loop_iteration;
        ctx.usage = run_state.usage;

        let step_kind = run_state.current_step;
        match step_kind {
            CurrentStep::CallLlm => {
                run_state.transition_to_llm();
                if run_state.loop_iteration as usize > config.max_loops {
                    return Err(AgentCoreError::MaxLoopsExceeded {
                        max_loops: config.max_loops,
                        iteration: run_state.loop_iteration as usize,
                    });
                }

                let messages = manager.get_messages().await?;
                let request = Request {
                    instructions: instruction.clone(),
                    input: RequestInput::Messages(messages),
                    tools: tool_definitions.clone(),
                    parameters: parameters.clone(),
                };
                let step_name = step::llm_call_step(run_state.loop_iteration as usize);
                let llm = Arc::clone(&config.llm);
                let callback = &mut callback;
                let response: Response = step::run(executor, &step_name, async move {
                    let chunks = llm
                        .new_streaming_responses(request)
                        .await
                        .map_err(|err| AgentCoreError::llm(err.to_string()))?;
                    stream::accumulate(chunks, |chunk| callback(chunk)).await
                })
                .await?;

                manager.add_messages(response.to_input_messages(), response.usage);
                run_state.accumulate_usage(response.usage);

                let tool_calls = response.tool_calls();
                let assistant_text = response.output.iter().find_map(|item| match item {
                    stream::OutputItem::Message { text } => Some(text.clone()),
                    _ => None,
                });
                step_history.push(StepInfo {
                    loop_iteration: run_state.loop_iteration,
                    assistant_text,
                    tool_calls: tool_calls.clone(),
                    usage: response.usage,
                });

                if tool_calls.is_empty() {
                    run_state.transition_to_complete();
                } else {
                    let (immediate, needs_approval): (Vec<ToolCall>, Vec<ToolCall>) = tool_calls
                        .into_iter()
                        .partition(|call| resolved.find(&call.name).is_none_or(|tool| !tool.need_approval()));

                    if needs_approval.is_empty() {
                        run_state.transition_to_execute_tools(immediate);
                    } else if immediate.is_empty() {
                        run_state.transition_to_await_approval(needs_approval);
                    } else {
                        run_state.transition_to_execute_tools(immediate);
                        run_state.tools_awaiting_approval = needs_approval;
                    }
                }
            }

            CurrentStep::ExecuteTools => {
                let pending = std::mem::take(&mut run_state.pending_tool_calls);
                for tool_call in pending {
                    let declined = rejected_call_ids
                        .as_ref()
                        .is_some_and(|ids| ids.contains(&tool_call.call_id));

                    let output_message = if declined {
                        InputMessage::declined_tool_output(&tool_call.call_id)
                    } else if let Some(tool) = resolved.find(&tool_call.name) {
                        let step_name = step::tool_step(&tool_call.id, &tool_call.name);
                        let ctx_ref = &ctx;
                        let call_ref = &tool_call;
                        step::run(executor, &step_name, async move {
                            tool.execute(ctx_ref, call_ref).await
                        })
                        .await?
                    } else {
                        warn!(tool = %tool_call.name, "tool not found, skipping call");
                        continue;
                    };

                    let output_text = match &output_message {
                        InputMessage::FunctionCallOutputMessage { output, .. } => output.clone(),
                        _ => String::new(),
                    };
                    let emit_name = step::emit_tool_result_step(&tool_call.call_id);
                    let call_id = tool_call.call_id.clone();
                    let item_id = tool_call.id.clone();
                    let callback = &mut callback;
                    step::run(executor, &emit_name, async move {
                        callback(&ResponseChunk::FunctionCallOutput {
                            call_id,
                            id: Some(item_id),
                            output: output_text,
                        });
                        Ok(())
                    })
                    .await?;

                    manager.add_messages([output_message], Usage::zero());
                }
                rejected_call_ids = None;

                run_state.clear_pending_tools();
                if run_state.tools_awaiting_approval.is_empty() {
                    run_state.current_step = CurrentStep::CallLlm;
                } else {
                    run_state.promote_awaiting_to_approval();
                }
            }

            CurrentStep::AwaitApproval => {
                step::run(executor, "save-messages-paused", async {
                    manager.save_messages(&run_state, &input.trace_id).await
                })
                .await?;

                if executor.checkpoint("emit-run-paused").await? {
                    callback(&events::run_paused(
                        &ctx.run_id,
                        &run_state.pending_tool_calls,
                        run_state.usage,
                        &input.trace_id,
                    ));
                }

                return Ok(AgentOutput {
                    run_id: ctx.run_id.clone(),
                    status: RunStatus::Paused,
                    output: Vec::new(),
                    pending_approvals: run_state.pending_tool_calls.clone(),
                    step_history,
                });
            }

            CurrentStep::Complete => {
                let output = manager.staged_messages().to_vec();

                step::run(executor, "save-messages-complete", async {
                    manager.save_messages(&run_state, &input.trace_id).await
                })
                .await?;

                if executor.checkpoint("emit-run-completed").await? {
                    callback(&events::run_completed(&ctx.run_id, run_state.usage, &input.trace_id));
                }

                return Ok(AgentOutput {
                    run_id: ctx.run_id.clone(),
                    status: RunStatus::Completed,
                    output,
                    pending_approvals: Vec::new(),
                    step_history,
                });
            }
        }
    }
}
