use std::net::SocketAddr;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode};
use weatherbot_core::{Agent, Config, CredentialId, Session};

use crate::{chat, web};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherbot", version, about = "Ask an LLM assistant about the weather")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store an API key for a service.
    Configure {
        /// Credential short name: "openai" or "openweather".
        credential: String,
    },

    /// Chat with the assistant in the terminal.
    Chat,

    /// Ask a single question and print the answer.
    Ask {
        question: String,

        /// Also print the tool calls made while answering.
        #[arg(long)]
        trace: bool,
    },

    /// Serve the browser chat widget.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8501")]
        bind: SocketAddr,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { credential } => configure(&credential),
            Command::Chat => {
                let agent = load_agent()?;
                chat::run(&agent).await
            }
            Command::Ask { question, trace } => {
                let agent = load_agent()?;
                let mut session = Session::new();
                let outcome = session.exchange(&agent, &question).await?;

                if trace {
                    for step in &outcome.steps {
                        println!("{}", chat::format_step(step));
                    }
                }
                println!("{}", outcome.reply);
                Ok(())
            }
            Command::Serve { bind } => {
                let config = Config::load()?;
                web::serve(bind, &config).await
            }
        }
    }
}

/// Agent built from the on-disk config plus environment overrides.
fn load_agent() -> anyhow::Result<Agent> {
    let config = Config::load()?;
    Agent::from_config(&config)
}

fn configure(name: &str) -> anyhow::Result<()> {
    let id = CredentialId::try_from(name)?;

    // File only: keys coming from the environment are not written back.
    let mut config = Config::load_file()?;

    let key = Password::new(&format!("{} API key:", id.label()))
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .with_help_message(&format!("Overridden at runtime by {} when set", id.env_var()))
        .prompt()
        .context("Failed to read API key")?;

    let key = key.trim();
    if key.is_empty() {
        bail!("No API key entered; configuration left unchanged.");
    }

    config.upsert_api_key(id, key.to_string());
    config.save()?;

    println!("Saved {} key to {}", id.label(), Config::config_file_path()?.display());
    Ok(())
}
