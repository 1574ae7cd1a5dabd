//! Interactive first-run wizard.

use anyhow::{bail, Context, Result};
use mimic_core::config::OneBotConfig;
use mimic_core::{ConversationId, DelayRange, MimicConfig};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::Path;

const DEFAULT_WS_URL: &str = "ws://127.0.0.1:3001";

/// Ask for the connection and behaviour settings, then write `path`.
/// Values already in `config` are offered as defaults.
pub fn run(path: &Path, mut config: MimicConfig) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    println!("Mimic setup. Press Enter to keep the value in brackets.\n");

    let current = config.onebot.clone();
    let ws_url = ask(
        &mut rl,
        "OneBot WebSocket URL",
        current.as_ref().map_or(DEFAULT_WS_URL, |o| o.ws_url.as_str()),
    )?;
    let token = ask(
        &mut rl,
        "Access token (empty for none)",
        current
            .as_ref()
            .and_then(|o| o.access_token.as_deref())
            .unwrap_or(""),
    )?;
    config.onebot = Some(OneBotConfig {
        ws_url,
        access_token: Some(token).filter(|t| !t.is_empty()),
    });

    let listed = config
        .chats
        .monitored
        .iter()
        .map(ConversationId::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let chats = ask(
        &mut rl,
        "Chats to monitor (group:<id> / private:<id>, comma separated)",
        &listed,
    )?;
    config.chats.monitored = parse_chat_list(&chats);

    let delay = config.behavior.response_delay;
    let min = ask_parsed(&mut rl, "Minimum reply delay, seconds", delay.min)?;
    let max = ask_parsed(&mut rl, "Maximum reply delay, seconds", delay.max)?;
    config.behavior.response_delay = DelayRange::new(min, max);
    config.behavior.response_probability = ask_parsed(
        &mut rl,
        "Reply probability (0..1)",
        config.behavior.response_probability,
    )?;

    let learning = ask(
        &mut rl,
        "Learn from chat messages? (y/n)",
        if config.behavior.learning_enabled { "y" } else { "n" },
    )?;
    if let Some(enabled) = parse_yes_no(&learning) {
        config.behavior.learning_enabled = enabled;
    }

    config.validate()?;
    config.save(path)?;
    println!("\nSaved {}", path.display());
    Ok(())
}

fn ask(rl: &mut DefaultEditor, question: &str, default: &str) -> Result<String> {
    match rl.readline(&format!("{} [{}]: ", question, default)) {
        Ok(line) => {
            let line = line.trim();
            Ok(if line.is_empty() { default.to_string() } else { line.to_string() })
        }
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => bail!("Setup aborted"),
        Err(e) => Err(e.into()),
    }
}

fn ask_parsed(rl: &mut DefaultEditor, question: &str, default: f64) -> Result<f64> {
    let answer = ask(rl, question, &default.to_string())?;
    answer
        .parse()
        .with_context(|| format!("'{}' is not a number", answer))
}

/// Split on commas and whitespace, dropping empties and duplicates.
fn parse_chat_list(input: &str) -> Vec<ConversationId> {
    let mut chats: Vec<ConversationId> = Vec::new();
    for id in input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(ConversationId::new)
    {
        if !chats.contains(&id) {
            chats.push(id);
        }
    }
    chats
}

fn parse_yes_no(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" | "true" | "д" | "да" => Some(true),
        "n" | "no" | "false" | "н" | "нет" => Some(false),
        _ => None,
    }
}
