use anyhow::Context;
use chrono::Local;
use inquire::{InquireError, Text};
use weatherbot_core::{Agent, ConversationTurn, Role, Session, ToolInvocation};

pub const TITLE: &str = "💬 Weather Chatbot";
pub const PLACEHOLDER: &str = "Ask me about the weather of any place";

/// Interactive terminal chat over a single in-memory session.
pub async fn run(agent: &Agent) -> anyhow::Result<()> {
    let mut session = Session::new();

    println!("{TITLE}");
    println!(
        "Ask about the current weather anywhere. Type /history to replay the conversation, \
         /quit or Esc to leave.\n"
    );

    loop {
        let input = match Text::new("You:").with_placeholder(PLACEHOLDER).prompt() {
            Ok(input) => input,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(err) => return Err(err).context("Failed to read chat input"),
        };

        match input.trim() {
            "" => continue,
            "/quit" => break,
            "/history" => {
                for turn in session.render_all() {
                    println!("{}", format_turn(turn));
                }
            }
            question => match session.exchange(agent, question).await {
                Ok(_) => {
                    if let Some(reply) = session.render_all().last() {
                        println!("{}\n", format_turn(reply));
                    }
                }
                Err(err) => eprintln!("Error: {err:#}\n"),
            },
        }
    }

    Ok(())
}

pub fn format_turn(turn: &ConversationTurn) -> String {
    let speaker = match turn.role {
        Role::User => "You",
        Role::Assistant => "Assistant",
    };
    let at = turn.at.with_timezone(&Local).format("%H:%M");
    format!("[{at}] {speaker}: {}", turn.content)
}

pub fn format_step(step: &ToolInvocation) -> String {
    format!("-> {}({}) = {}", step.tool, step.arguments, step.output)
}
