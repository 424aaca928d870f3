//! Per-user conversation logs.
//!
//! A [`Session`] is an append-only transcript owned by whoever handles the
//! user's requests: the terminal chat loop holds one directly, the web server
//! keeps them in a [`SessionStore`]. Nothing is persisted.

use anyhow::Result;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    agent::{Agent, TurnOutcome},
    model::ConversationTurn,
};

/// Idle time after which the web store forgets a session.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    turns: Vec<ConversationTurn>,
}

impl Session {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4(), turns: Vec::new() }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// Every turn so far, oldest first.
    pub fn render_all(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Run one user turn through `agent` and record it.
    ///
    /// The user and assistant turns are appended only once the agent has
    /// answered, so a failed turn leaves the transcript untouched.
    pub async fn exchange(&mut self, agent: &Agent, input: &str) -> Result<TurnOutcome> {
        let outcome = agent.respond(&self.turns, input).await?;
        self.record(input, &outcome);
        Ok(outcome)
    }

    fn record(&mut self, input: &str, outcome: &TurnOutcome) {
        self.append(ConversationTurn::user(input));
        self.append(ConversationTurn::assistant(outcome.reply.clone()));
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// A session reachable from concurrent requests.
///
/// `turn` serializes exchanges; the transcript has its own lock and is only
/// written once the agent has answered, so readers never wait on a turn.
#[derive(Debug)]
pub struct SharedSession {
    turn: Mutex<()>,
    log: RwLock<Session>,
}

impl SharedSession {
    fn new(session: Session) -> Self {
        Self { turn: Mutex::new(()), log: RwLock::new(session) }
    }

    /// Snapshot of every turn so far, oldest first.
    pub async fn transcript(&self) -> Vec<ConversationTurn> {
        self.log.read().await.render_all().to_vec()
    }

    /// Same contract as [`Session::exchange`]; concurrent calls run one at a time.
    pub async fn exchange(&self, agent: &Agent, input: &str) -> Result<TurnOutcome> {
        let _turn = self.turn.lock().await;
        let history = self.transcript().await;
        let outcome = agent.respond(&history, input).await?;
        self.log.write().await.record(input, &outcome);
        Ok(outcome)
    }

    fn is_busy(&self) -> bool {
        self.turn.try_lock().is_err()
    }
}

#[derive(Debug)]
struct Entry {
    session: Arc<SharedSession>,
    last_active: Instant,
}

impl Entry {
    /// A session mid-turn is never idle, however long the turn takes.
    fn is_expired(&self, ttl: Duration) -> bool {
        self.last_active.elapsed() > ttl && !self.session.is_busy()
    }
}

/// In-memory sessions keyed by id.
///
/// Sessions end when removed or after `ttl` without being looked up.
#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<Uuid, Entry>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, sessions: Mutex::default() }
    }

    /// Start a session, first dropping any that have gone idle.
    pub async fn create(&self) -> Uuid {
        let session = Session::new();
        let id = session.id();

        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_expired(self.ttl));
        if sessions.len() < before {
            debug!(expired = before - sessions.len(), "idle sessions dropped");
        }
        let session = Arc::new(SharedSession::new(session));
        sessions.insert(id, Entry { session, last_active: Instant::now() });
        info!(session = %id, active = sessions.len(), "session created");
        id
    }

    /// Look up a live session and mark it active.
    pub async fn get(&self, id: Uuid) -> Option<Arc<SharedSession>> {
        let mut sessions = self.sessions.lock().await;
        if sessions.get(&id)?.is_expired(self.ttl) {
            sessions.remove(&id);
            info!(session = %id, "session expired");
            return None;
        }
        let entry = sessions.get_mut(&id)?;
        entry.last_active = Instant::now();
        Some(entry.session.clone())
    }

    /// End a session. Returns whether it existed.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.lock().await.remove(&id).is_some();
        if removed {
            info!(session = %id, "session removed");
        }
        removed
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}
