//! Bounded tool-calling loop around a [`ChatModel`].

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::{
    config::Config,
    error::AgentError,
    http::build_client,
    llm::{ChatMessage, ChatModel, OpenAiChat, ToolCall},
    model::{ConversationTurn, Role},
    prompt::SYSTEM_PROMPT,
    tool::Toolset,
};

pub const DEFAULT_MAX_ITERATIONS: usize = 8;

/// A tool call executed during a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInvocation {
    pub tool: String,
    pub arguments: Value,
    pub output: String,
}

/// Result of one user turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub reply: String,
    pub steps: Vec<ToolInvocation>,
    /// Model rounds used, including the final one.
    pub iterations: usize,
}

#[derive(Debug)]
enum State {
    AwaitingModel,
    AwaitingToolResult(Vec<ToolCall>),
    Done(String),
}

#[derive(Debug)]
pub struct Agent {
    model: Arc<dyn ChatModel>,
    tools: Toolset,
    max_iterations: usize,
}

impl Agent {
    pub fn new(model: Arc<dyn ChatModel>, tools: Toolset, max_iterations: usize) -> Self {
        Self { model, tools, max_iterations: max_iterations.max(1) }
    }

    /// OpenAI model plus the geocoding and weather tools, all from config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = build_client(config.http_timeout())?;
        let model = OpenAiChat::from_config(config, http.clone())?;
        debug!(model = model.model(), max_iterations = config.max_iterations, "agent configured");

        Ok(Self::new(
            Arc::new(model),
            Toolset::from_config(config, http),
            config.max_iterations,
        ))
    }

    /// Answer `input` given the earlier turns of the conversation.
    ///
    /// Tool failures end the turn with the error; nothing is retried.
    pub async fn respond(&self, history: &[ConversationTurn], input: &str) -> Result<TurnOutcome> {
        let definitions = self.tools.definitions();
        let mut messages = seed_messages(history, input);
        let mut steps = Vec::new();
        let mut iterations = 0;
        let mut state = State::AwaitingModel;

        loop {
            state = match state {
                State::AwaitingModel => {
                    if iterations == self.max_iterations {
                        return Err(AgentError::IterationLimit(self.max_iterations).into());
                    }
                    iterations += 1;
                    debug!(
                        iteration = iterations,
                        messages = messages.len(),
                        "requesting completion"
                    );

                    let reply = self.model.complete(&messages, &definitions).await?;

                    if reply.tool_calls.is_empty() {
                        match reply.content.filter(|text| !text.trim().is_empty()) {
                            Some(text) => State::Done(text),
                            None => return Err(AgentError::EmptyReply.into()),
                        }
                    } else {
                        let calls = reply.tool_calls;
                        messages.push(ChatMessage::Assistant {
                            content: reply.content,
                            tool_calls: calls.clone(),
                        });
                        State::AwaitingToolResult(calls)
                    }
                }
                State::AwaitingToolResult(calls) => {
                    for call in calls {
                        let step = self.invoke(&call).await?;
                        messages.push(ChatMessage::Tool {
                            tool_call_id: call.id,
                            content: step.output.clone(),
                        });
                        steps.push(step);
                    }
                    State::AwaitingModel
                }
                State::Done(reply) => return Ok(TurnOutcome { reply, steps, iterations }),
            };
        }
    }

    async fn invoke(&self, call: &ToolCall) -> Result<ToolInvocation> {
        let name = call.function.name.as_str();
        let raw = call.function.arguments.trim();
        let arguments: Value = if raw.is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(raw).map_err(|e| AgentError::InvalidToolArguments {
                tool: name.to_string(),
                reason: e.to_string(),
            })?
        };

        debug!(tool = name, %arguments, "calling tool");
        let output = self
            .tools
            .call(name, &arguments)
            .await
            .with_context(|| format!("Tool '{name}' failed"))?;
        debug!(tool = name, bytes = output.len(), "tool returned");

        Ok(ToolInvocation { tool: name.to_string(), arguments, output })
    }
}

fn seed_messages(history: &[ConversationTurn], input: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));
    messages.extend(history.iter().map(|turn| match turn.role {
        Role::User => ChatMessage::user(&turn.content),
        Role::Assistant => ChatMessage::assistant(&turn.content),
    }));
    messages.push(ChatMessage::user(input));
    messages
}
