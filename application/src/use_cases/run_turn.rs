//! Run Turn use case: the bounded agentic loop.
//!
//! One instance drives any number of turns; nothing mutable is shared
//! between turns. Each turn:
//!
//! 1. `Requesting`: send history plus the tool schema filtered by the
//!    round's [`ToolChoice`].
//! 2. A reply without tool calls ends the turn as `Answered`.
//! 3. `Dispatching`: run every requested call concurrently, wait for all
//!    of them, append the assistant request and one tool-result message per
//!    call in request order.
//! 4. After `max_iterations` rounds without an answer the turn ends as
//!    `Exhausted` with the last assistant text.
//!
//! A wall-clock budget covers the whole turn. When it runs out (or the
//! cancellation token fires) in-flight calls are dropped and the turn
//! returns what it has, flagged `Incomplete`.

use crate::config::TurnParams;
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::llm_gateway::{CompletionRequest, GatewayError, LlmGateway};
use crate::ports::tool_executor::ToolExecutorPort;
use crate::ports::turn_progress::{NoTurnProgress, TurnProgressNotifier};
use crate::use_cases::shared::{Interruption, cancelled, guarded};
use aion_domain::{
    Conversation, Message, ToolCallRequest, ToolCallResult, ToolChoice, ToolContext, TurnOutcome,
    TurnResult, TurnState,
};
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Errors that abort a turn before it can produce any answer.
#[derive(Error, Debug)]
pub enum RunTurnError {
    #[error("Gateway error: {0}")]
    GatewayError(#[from] GatewayError),

    #[error("Invalid tool choice: {0}")]
    InvalidToolChoice(String),
}

/// Input handed over by the context-assembly collaborator.
#[derive(Debug, Clone, Default)]
pub struct RunTurnInput {
    pub user_message: String,
    /// Finished context string (retrieved memories, documents, instructions)
    pub context: Option<String>,
    /// Prior conversation messages
    pub history: Vec<Message>,
    /// Enabled tool names; `None` enables every registered tool
    pub enabled_tools: Option<Vec<String>>,
    /// Overrides the configured default tool choice
    pub tool_choice: Option<ToolChoice>,
    pub user_id: Option<String>,
}

impl RunTurnInput {
    pub fn new(user_message: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_enabled_tools(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.enabled_tools = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

pub struct RunTurnUseCase<G: LlmGateway, T: ToolExecutorPort> {
    gateway: Arc<G>,
    tool_executor: Arc<T>,
    params: TurnParams,
    cancellation_token: Option<CancellationToken>,
    conversation_logger: Arc<dyn ConversationLogger>,
}

impl<G: LlmGateway, T: ToolExecutorPort> RunTurnUseCase<G, T> {
    pub fn new(gateway: Arc<G>, tool_executor: Arc<T>) -> Self {
        Self {
            gateway,
            tool_executor,
            params: TurnParams::default(),
            cancellation_token: None,
            conversation_logger: Arc::new(NoConversationLogger),
        }
    }

    pub fn with_params(mut self, params: TurnParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.conversation_logger = logger;
        self
    }

    pub async fn execute(&self, input: RunTurnInput) -> Result<TurnResult, RunTurnError> {
        self.execute_with_progress(input, &NoTurnProgress).await
    }

    pub async fn execute_with_progress(
        &self,
        input: RunTurnInput,
        progress: &dyn TurnProgressNotifier,
    ) -> Result<TurnResult, RunTurnError> {
        let turn_id = Uuid::new_v4().to_string();
        let choice = input
            .tool_choice
            .clone()
            .unwrap_or_else(|| self.params.default_tool_choice.clone());
        self.validate_choice(&choice, input.enabled_tools.as_deref())?;

        let max_iterations = self.params.max_iterations.max(1);
        let deadline = Instant::now() + self.params.turn_timeout;
        let ctx = ToolContext {
            user_id: input.user_id.clone(),
            turn_id: Some(turn_id.clone()),
        };

        let mut conversation = Self::build_conversation(&input);
        let mut trace: Vec<ToolCallResult> = Vec::new();
        let mut rounds = 0usize;
        let mut last_text = String::new();
        let mut state = TurnState::Requesting;

        info!(turn = %turn_id, tool_choice = %choice, max_iterations, "Starting turn");
        self.conversation_logger.log(ConversationEvent::new(
            "turn_started",
            json!({
                "turn_id": turn_id,
                "user_id": input.user_id,
                "tool_choice": choice.to_string(),
                "enabled_tools": input.enabled_tools,
                "message": input.user_message,
            }),
        ));

        let result = loop {
            debug!(turn = %turn_id, round = rounds, state = %state, "Turn state");

            let round_choice = choice.for_round(rounds);
            let tools = self
                .tool_executor
                .schema_for(input.enabled_tools.as_deref(), &round_choice);
            progress.on_model_request(rounds, tools.len());

            let request = CompletionRequest::new(conversation.messages().to_vec())
                .with_tools(tools, round_choice.clone());

            let reply = match guarded(
                self.gateway.complete(request),
                deadline,
                &self.cancellation_token,
            )
            .await
            {
                Ok(Ok(reply)) => reply,
                Ok(Err(e)) if rounds == 0 => {
                    warn!(turn = %turn_id, error = %e, "Model request failed");
                    return Err(e.into());
                }
                Ok(Err(e)) => {
                    warn!(turn = %turn_id, round = rounds, error = %e, "Model request failed mid-turn");
                    break Self::incomplete(last_text, format!("model request failed: {}", e), trace, rounds);
                }
                Err(interruption) => {
                    warn!(turn = %turn_id, round = rounds, reason = interruption.reason(), "Turn interrupted");
                    break Self::incomplete(last_text, interruption.reason().to_string(), trace, rounds);
                }
            };

            let text = reply.text_content();
            if !text.is_empty() {
                last_text = text.clone();
            }

            let calls = if round_choice.allows_tools() {
                reply.tool_calls()
            } else {
                if reply.has_tool_calls() {
                    warn!(turn = %turn_id, "Model requested tools with tool_choice=none; ignoring");
                }
                Vec::new()
            };

            self.conversation_logger.log(ConversationEvent::new(
                "model_reply",
                json!({
                    "turn_id": turn_id,
                    "round": rounds,
                    "model": reply.model,
                    "text": text,
                    "tool_calls": calls.iter().map(|c| c.tool_name.as_str()).collect::<Vec<_>>(),
                }),
            ));

            if calls.is_empty() {
                state = TurnState::Answered;
                break TurnResult {
                    answer: text,
                    outcome: TurnOutcome::Answered,
                    trace,
                    rounds,
                };
            }

            state = TurnState::Dispatching;
            debug!(turn = %turn_id, round = rounds, calls = calls.len(), state = %state, "Dispatching tool calls");
            progress.on_round_start(rounds, calls.len());

            let (results, interruption) = self
                .dispatch_round(&calls, &ctx, deadline, progress)
                .await;
            trace.extend(results.iter().cloned());

            if let Some(interruption) = interruption {
                warn!(
                    turn = %turn_id,
                    round = rounds,
                    resolved = results.len(),
                    requested = calls.len(),
                    reason = interruption.reason(),
                    "Dispatch interrupted"
                );
                break Self::incomplete(last_text, interruption.reason().to_string(), trace, rounds);
            }

            conversation.push_tool_round(text, calls, &results);
            rounds += 1;

            if rounds >= max_iterations {
                state = TurnState::Exhausted;
                warn!(turn = %turn_id, max_iterations, "Turn exhausted without a final answer");
                break TurnResult {
                    answer: last_text,
                    outcome: TurnOutcome::Exhausted { max_iterations },
                    trace,
                    rounds,
                };
            }

            state = TurnState::Requesting;
        };

        info!(
            turn = %turn_id,
            state = %state,
            rounds = result.rounds,
            calls = result.trace.len(),
            failed = result.failed_calls().count(),
            "Turn finished"
        );
        self.conversation_logger.log(ConversationEvent::new(
            "turn_finished",
            json!({
                "turn_id": turn_id,
                "outcome": result.outcome,
                "rounds": result.rounds,
                "answer": result.answer,
            }),
        ));
        progress.on_turn_complete(&result);

        Ok(result)
    }

    /// Run one round's calls concurrently. Results come back in request
    /// order; on interruption only the calls that already resolved are kept.
    async fn dispatch_round(
        &self,
        calls: &[ToolCallRequest],
        ctx: &ToolContext,
        deadline: Instant,
        progress: &dyn TurnProgressNotifier,
    ) -> (Vec<ToolCallResult>, Option<Interruption>) {
        for call in calls {
            progress.on_tool_call(call);
            self.conversation_logger.log(ConversationEvent::new(
                "tool_call",
                json!({
                    "turn_id": ctx.turn_id,
                    "request_id": call.id,
                    "tool": call.tool_name,
                    "args": call.arguments,
                }),
            ));
        }

        let executor = &self.tool_executor;
        let mut pending: FuturesUnordered<_> = calls
            .iter()
            .enumerate()
            .map(|(index, call)| async move { (index, executor.execute(call, ctx).await) })
            .collect();

        let mut slots: Vec<Option<ToolCallResult>> = vec![None; calls.len()];
        let budget = tokio::time::sleep_until(deadline);
        tokio::pin!(budget);

        let interruption = loop {
            tokio::select! {
                next = pending.next() => match next {
                    Some((index, result)) => {
                        debug!(
                            tool = %result.tool_name,
                            status = ?result.status,
                            latency_ms = result.latency_ms,
                            "Tool call resolved"
                        );
                        progress.on_tool_result(&result);
                        self.conversation_logger.log(ConversationEvent::new(
                            "tool_result",
                            json!({
                                "turn_id": ctx.turn_id,
                                "request_id": result.request_id,
                                "tool": result.tool_name,
                                "status": result.status,
                                "latency_ms": result.latency_ms,
                                "error": result.error.as_ref().map(|e| e.code()),
                            }),
                        ));
                        slots[index] = Some(result);
                    }
                    None => break None,
                },
                _ = &mut budget => break Some(Interruption::BudgetExceeded),
                _ = cancelled(&self.cancellation_token) => break Some(Interruption::Cancelled),
            }
        };

        // Dropping the set cancels whatever is still running.
        drop(pending);

        (slots.into_iter().flatten().collect(), interruption)
    }

    fn validate_choice(
        &self,
        choice: &ToolChoice,
        enabled: Option<&[String]>,
    ) -> Result<(), RunTurnError> {
        if let Some(name) = choice.forced_name() {
            let registered = self.tool_executor.has_tool(name);
            let enabled_ok = enabled.is_none_or(|names| names.iter().any(|n| n == name));
            if !registered || !enabled_ok {
                return Err(RunTurnError::InvalidToolChoice(format!(
                    "forced tool '{}' is not registered or not enabled",
                    name
                )));
            }
        }
        Ok(())
    }

    fn build_conversation(input: &RunTurnInput) -> Conversation {
        let mut conversation = Conversation::new();
        if let Some(context) = input.context.as_deref()
            && !context.trim().is_empty()
        {
            conversation.push(Message::system(context));
        }
        for message in &input.history {
            conversation.push(message.clone());
        }
        conversation.push(Message::user(input.user_message.clone()));
        conversation
    }

    fn incomplete(
        answer: String,
        reason: String,
        trace: Vec<ToolCallResult>,
        rounds: usize,
    ) -> TurnResult {
        TurnResult {
            answer,
            outcome: TurnOutcome::Incomplete { reason },
            trace,
            rounds,
        }
    }
}
