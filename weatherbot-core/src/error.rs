use thiserror::Error;

use crate::config::CredentialId;

/// Typed failures of a chat turn that callers may want to match on.
///
/// Transport and decoding problems in the lookups and the model client stay
/// `anyhow::Error` with context attached; these variants cover the cases the
/// front-ends react to specifically.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(
        "Please add your {} API key to continue.\nHint: run `weatherbot configure {}` or set {}.",
        .0.label(),
        .0,
        .0.env_var()
    )]
    MissingCredential(CredentialId),

    #[error("Agent stopped after {0} model round(s) without a final answer")]
    IterationLimit(usize),

    #[error("Model returned an empty reply")]
    EmptyReply,

    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidToolArguments { tool: String, reason: String },
}
