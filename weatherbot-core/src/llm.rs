//! OpenAI-compatible chat completions with function calling.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;

use crate::{
    config::{Config, CredentialId},
    http::{endpoint, truncate_body},
};

/// A message in the model's context window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage::System { content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage::User { content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage::Assistant { content: Some(content.into()), tool_calls: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn function(id: impl Into<String>, function: FunctionCall) -> Self {
        Self { id: id.into(), kind: function_kind(), function }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, as produced by the model.
    pub arguments: String,
}

fn function_kind() -> String {
    "function".to_string()
}

/// A callable function advertised to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// What the model said in one round: text, tool calls, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantMessage {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

#[async_trait]
pub trait ChatModel: Send + Sync + Debug {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<AssistantMessage>;
}

#[derive(Debug, Clone)]
pub struct OpenAiChat {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    http: Client,
}

impl OpenAiChat {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        http: Client,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
            http,
        }
    }

    /// Build from config; fails with the blocking message when no key is set.
    pub fn from_config(config: &Config, http: Client) -> Result<Self> {
        let api_key = config.require_api_key(CredentialId::OpenAi)?;
        Ok(Self::new(&config.endpoints.llm, api_key, &config.model, config.temperature, http))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDefinition],
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<AssistantMessage> {
        let url = endpoint(&self.base_url, "chat/completions");
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            tools,
            tool_choice: (!tools.is_empty()).then_some("auto"),
        };

        let res = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to chat completions endpoint")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read chat completions response body")?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| truncate_body(&body));
            return Err(anyhow!("Chat completion failed with status {status}: {detail}"));
        }

        let parsed: CompletionResponse =
            serde_json::from_str(&body).context("Failed to parse chat completions JSON")?;

        let message = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Chat completion response contained no choices"))?
            .message;

        Ok(AssistantMessage {
            content: message.content,
            tool_calls: message.tool_calls.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::serve;
    use axum::{Json, Router, http::HeaderMap, http::StatusCode, routing::post};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<(HeaderMap, Value)>>>;

    async fn stub_completions(status: StatusCode, reply: Value) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let sink = captured.clone();
        let router = Router::new().route(
            "/v1/chat/completions",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let sink = sink.clone();
                let reply = reply.clone();
                async move {
                    sink.lock().expect("capture lock").push((headers, body));
                    (status, Json(reply))
                }
            }),
        );
        (format!("{}/v1", serve(router).await), captured)
    }

    fn chat(base: String) -> OpenAiChat {
        OpenAiChat::new(base, "sk-test", "gpt-3.5-turbo", 0.0, Client::new())
    }

    fn weather_tool() -> ToolDefinition {
        ToolDefinition {
            kind: "function",
            function: FunctionDefinition {
                name: "get_weather_data",
                description: "Current weather",
                parameters: json!({"type": "object", "properties": {"city": {"type": "string"}}}),
            },
        }
    }

    #[tokio::test]
    async fn parses_tool_calls() {
        let reply = json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "get_weather_data",
                            "arguments": "{\"city\":\"London\"}"
                        }
                    }]
                }
            }]
        });
        let (base, _) = stub_completions(StatusCode::OK, reply).await;

        let msg = chat(base)
            .complete(&[ChatMessage::user("weather in London?")], &[weather_tool()])
            .await
            .expect("completion succeeds");

        assert_eq!(msg.content, None);
        assert_eq!(msg.tool_calls.len(), 1);
        assert_eq!(msg.tool_calls[0].id, "call_1");
        assert_eq!(msg.tool_calls[0].function.name, "get_weather_data");
        assert_eq!(msg.tool_calls[0].function.arguments, "{\"city\":\"London\"}");
    }

    #[tokio::test]
    async fn sends_model_messages_tools_and_bearer() {
        let reply = json!({"choices": [{"message": {"role": "assistant", "content": "Hi!"}}]});
        let (base, captured) = stub_completions(StatusCode::OK, reply).await;

        let msg = chat(base)
            .complete(
                &[ChatMessage::system("be brief"), ChatMessage::user("hello")],
                &[weather_tool()],
            )
            .await
            .expect("completion succeeds");
        assert_eq!(msg.content.as_deref(), Some("Hi!"));
        assert!(msg.tool_calls.is_empty());

        let captured = captured.lock().expect("capture lock");
        let (headers, body) = &captured[0];
        assert_eq!(
            headers.get("authorization").and_then(|v| v.to_str().ok()),
            Some("Bearer sk-test")
        );
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["messages"][0], json!({"role": "system", "content": "be brief"}));
        assert_eq!(body["messages"][1], json!({"role": "user", "content": "hello"}));
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "get_weather_data");
    }

    #[tokio::test]
    async fn omits_tools_when_none_are_offered() {
        let reply = json!({"choices": [{"message": {"content": "ok"}}]});
        let (base, captured) = stub_completions(StatusCode::OK, reply).await;

        chat(base).complete(&[ChatMessage::user("hi")], &[]).await.expect("completion succeeds");

        let captured = captured.lock().expect("capture lock");
        let body = &captured[0].1;
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[tokio::test]
    async fn surfaces_provider_error_message() {
        let reply = json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        });
        let (base, _) = stub_completions(StatusCode::UNAUTHORIZED, reply).await;

        let err = chat(base).complete(&[ChatMessage::user("hi")], &[]).await.unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("Incorrect API key provided"));
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let (base, _) = stub_completions(StatusCode::OK, json!({"choices": []})).await;

        let err = chat(base).complete(&[ChatMessage::user("hi")], &[]).await.unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }

    #[test]
    fn tool_messages_serialize_with_call_id() {
        let calls = vec![ToolCall::function(
            "call_9",
            FunctionCall {
                name: "get_city_name".into(),
                arguments: "{\"location\":\"Paris\"}".into(),
            },
        )];
        let assistant = ChatMessage::Assistant { content: None, tool_calls: calls };
        let tool = ChatMessage::Tool { tool_call_id: "call_9".into(), content: "{}".into() };

        let assistant = serde_json::to_value(&assistant).expect("serializes");
        assert_eq!(assistant["role"], "assistant");
        assert_eq!(assistant["tool_calls"][0]["type"], "function");
        assert_eq!(assistant["tool_calls"][0]["function"]["name"], "get_city_name");

        let tool = serde_json::to_value(&tool).expect("serializes");
        assert_eq!(tool, json!({"role": "tool", "tool_call_id": "call_9", "content": "{}"}));
    }

    #[test]
    fn from_config_requires_openai_key() {
        let err = OpenAiChat::from_config(&Config::default(), Client::new()).unwrap_err();
        assert!(err.to_string().contains("Please add your OpenAI API key to continue."));
    }
}
