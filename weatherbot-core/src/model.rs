use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a geocoding lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedPlace {
    /// First record of the geocoder's result array, exactly as returned.
    Found(Value),
    NotFound,
}

impl ResolvedPlace {
    /// Text the model sees when the geocoder has no match.
    pub const NOT_FOUND_TEXT: &'static str = "City not found";

    /// Render the lookup result as a tool observation for the model.
    pub fn to_observation(&self) -> String {
        match self {
            ResolvedPlace::Found(record) => record.to_string(),
            ResolvedPlace::NotFound => Self::NOT_FOUND_TEXT.to_string(),
        }
    }
}

/// Raw current-weather response. The body is never parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherReading {
    pub status: u16,
    pub body: String,
}

impl WeatherReading {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Render the reading as a tool observation, keeping a non-2xx status
    /// visible next to the body.
    pub fn to_observation(&self) -> String {
        if self.is_success() {
            self.body.clone()
        } else {
            format!("HTTP {}: {}", self.status, self.body)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into(), at: Utc::now() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}
