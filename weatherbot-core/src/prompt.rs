/// Instructions and few-shot examples given to the model before every turn.
pub const SYSTEM_PROMPT: &str = include_str!("../assets/system_prompt.md");
