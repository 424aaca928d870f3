//! Core library for the `weatherbot` chat assistant.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - HTTP clients for geocoding and current weather
//! - The tools and system prompt offered to the model
//! - A bounded tool-calling agent loop and per-user chat sessions
//!
//! It is used by `weatherbot-cli`, but can also be reused by other binaries or services.

pub mod agent;
pub mod config;
pub mod error;
pub mod http;
pub mod llm;
pub mod lookup;
pub mod model;
pub mod prompt;
pub mod session;
pub mod tool;

#[cfg(test)]
mod testutil;

pub use agent::{Agent, ToolInvocation, TurnOutcome};
pub use config::{Config, CredentialId, Endpoints};
pub use error::AgentError;
pub use llm::{ChatModel, OpenAiChat};
pub use lookup::{GeocodingClient, WeatherClient};
pub use model::{ConversationTurn, ResolvedPlace, Role, WeatherReading};
pub use session::{Session, SessionStore, SharedSession};
pub use tool::{Tool, ToolId, Toolset};
