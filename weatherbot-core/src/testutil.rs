//! Local stand-ins for the upstream services used by unit tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use axum::{
    Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
};

use crate::llm::{AssistantMessage, ChatMessage, ChatModel, FunctionCall, ToolCall, ToolDefinition};

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind stub listener");
    let addr = listener.local_addr().expect("stub listener address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub server");
    });
    format!("http://{addr}")
}

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
}

/// Requests observed by a stub route.
#[derive(Debug, Clone, Default)]
pub struct Seen(Arc<Mutex<Vec<SeenRequest>>>);

impl Seen {
    pub fn all(&self) -> Vec<SeenRequest> {
        self.0.lock().expect("seen lock").clone()
    }

    pub fn single(&self) -> SeenRequest {
        let all = self.all();
        assert_eq!(all.len(), 1, "expected exactly one request, got {}", all.len());
        all.into_iter().next().expect("one request")
    }
}

/// A GET route at `path` that answers every request with `status` and `body`.
pub async fn stub_get(path: &str, status: u16, body: &str) -> (String, Seen) {
    #[derive(Clone)]
    struct Stub {
        status: StatusCode,
        body: String,
        seen: Seen,
    }

    async fn handle(
        State(stub): State<Stub>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> (StatusCode, String) {
        stub.seen.0.lock().expect("seen lock").push(SeenRequest { query, headers });
        (stub.status, stub.body.clone())
    }

    let seen = Seen::default();
    let stub = Stub {
        status: StatusCode::from_u16(status).expect("valid status"),
        body: body.to_string(),
        seen: seen.clone(),
    };
    let router = Router::new().route(path, get(handle)).with_state(stub);

    (serve(router).await, seen)
}

/// A [`ChatModel`] that replays queued replies and records what it was sent.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<AssistantMessage>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new(replies: impl IntoIterator<Item = AssistantMessage>) -> Self {
        Self { replies: Mutex::new(replies.into_iter().collect()), requests: Mutex::default() }
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> anyhow::Result<AssistantMessage> {
        self.requests.lock().expect("requests lock").push(messages.to_vec());
        self.replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("scripted model ran out of replies"))
    }
}

pub fn text(content: &str) -> AssistantMessage {
    AssistantMessage { content: Some(content.to_string()), tool_calls: Vec::new() }
}

pub fn call(id: &str, name: &str, arguments: &str) -> AssistantMessage {
    AssistantMessage {
        content: None,
        tool_calls: vec![ToolCall::function(
            id,
            FunctionCall { name: name.to_string(), arguments: arguments.to_string() },
        )],
    }
}
