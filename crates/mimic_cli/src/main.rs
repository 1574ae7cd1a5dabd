use anyhow::Result;
use clap::{Parser, Subcommand};
use mimic_core::{ConversationId, MimicConfig};
use std::path::{Path, PathBuf};
use tracing::info;

mod logging;
mod repl;
mod setup;

#[derive(Parser, Debug)]
#[command(name = "mimic", author, version, about, long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(short, long, default_value = "mimic.toml", env = "MIMIC_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect and chat until Ctrl-C (default)
    Run,
    /// Interactive wizard that writes the config file
    Setup,
    /// Edit the list of monitored chats
    Chats {
        #[command(subcommand)]
        action: ChatsAction,
    },
    /// Offline session in the terminal
    Repl,
}

#[derive(Subcommand, Debug)]
enum ChatsAction {
    /// Start monitoring a chat, e.g. `group:123456`
    Add { id: String },
    /// Stop monitoring a chat
    Remove { id: String },
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let file_config = MimicConfig::load_raw(&args.config)?;
    let _log_guard = logging::init(&file_config.logging)?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run(effective_config(&args.config)?).await,
        Command::Setup => setup::run(&args.config, file_config),
        Command::Chats { action } => edit_chats(&args.config, file_config, action),
        Command::Repl => repl::run(&effective_config(&args.config)?),
    }
}

/// File config with env overrides, validated. A missing file means defaults.
fn effective_config(path: &Path) -> Result<MimicConfig> {
    if path.exists() {
        MimicConfig::load(path)
    } else {
        Ok(MimicConfig::load_or_default(path))
    }
}

fn edit_chats(path: &Path, mut config: MimicConfig, action: ChatsAction) -> Result<()> {
    match action {
        ChatsAction::Add { id } => {
            let id = ConversationId::new(id);
            anyhow::ensure!(!id.as_str().is_empty(), "Chat id must not be empty");
            if config.chats.add(id.clone()) {
                config.save(path)?;
                println!("Added {}", id);
            } else {
                println!("{} is already monitored", id);
            }
        }
        ChatsAction::Remove { id } => {
            let id = ConversationId::new(id);
            if config.chats.remove(&id) {
                config.save(path)?;
                println!("Removed {}", id);
            } else {
                println!("{} is not monitored", id);
            }
        }
        ChatsAction::List => {
            if config.chats.monitored.is_empty() {
                println!("No monitored chats");
            }
            for id in &config.chats.monitored {
                println!("{}", id);
            }
        }
    }
    Ok(())
}

#[cfg(feature = "onebot")]
async fn run(config: MimicConfig) -> Result<()> {
    use anyhow::Context;
    use mimic_agent::{ChatAgent, IdleInitiator};
    use mimic_corpus::CorpusStore;
    use mimic_onebot::OneBotClient;
    use std::sync::Arc;
    use tokio::sync::watch;

    let onebot = config
        .onebot
        .clone()
        .context("No [onebot] section configured; run `mimic setup` or set ONEBOT_WS_URL")?;

    info!("Loading corpus from {}...", config.corpus.path.display());
    let corpus = CorpusStore::load(&config.corpus.path);
    let stats = corpus.stats();
    info!(
        "Corpus ready: {} greetings, {} patterns, {} associated words",
        stats.greetings, stats.patterns, stats.associated_words
    );

    let (client, mut incoming) = OneBotClient::connect(&onebot)?;
    let agent = Arc::new(ChatAgent::new(&config, corpus, Arc::new(client)));

    if config.chats.monitored.is_empty() {
        tracing::warn!("No monitored chats; add one with `mimic chats add <id>`");
    }
    if config.chats.greet_on_start {
        agent.greet_all().await;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let initiator = config
        .initiator
        .enabled
        .then(|| IdleInitiator::new(agent.clone(), config.initiator.clone()).spawn(shutdown_rx));

    info!("Mimic is online. Press Ctrl-C to stop.");
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            message = incoming.recv() => match message {
                Some(message) => {
                    agent.on_message(message).await;
                }
                None => {
                    tracing::warn!("Transport closed");
                    break;
                }
            },
            _ = &mut ctrl_c => {
                info!("Shutting down...");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(true);
    if let Some(handle) = initiator {
        let _ = handle.await;
    }
    agent.shutdown().await;
    Ok(())
}

#[cfg(not(feature = "onebot"))]
async fn run(_config: MimicConfig) -> Result<()> {
    anyhow::bail!("This build has no transport; rebuild with the `onebot` feature")
}
