//! Offline terminal session: every line is learned and answered.

use anyhow::Result;
use mimic_core::{MimicConfig, StdEntropy};
use mimic_corpus::{CorpusStore, LearningEngine};
use mimic_expression::{Humanizer, ResponseGenerator};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

pub fn run(config: &MimicConfig) -> Result<()> {
    let mut store = CorpusStore::load(&config.corpus.path);
    let learner = LearningEngine::new();
    let generator = ResponseGenerator::with_tokenizer(learner.tokenizer());
    let humanizer = Humanizer::new();
    let mut entropy = StdEntropy::from_entropy();

    let mut rl = DefaultEditor::new()?;
    println!("Mimic REPL. Commands: stats, save, quit.");

    loop {
        let line = match rl.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                tracing::error!("Readline error: {}", e);
                break;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(trimmed);

        match trimmed {
            "quit" | "exit" => break,
            "save" => {
                store.save(&config.corpus.path);
                println!("Saved to {}", config.corpus.path.display());
            }
            "stats" => {
                let s = store.stats();
                println!(
                    "greetings: {}, response keys: {} ({} responses)",
                    s.greetings, s.response_keys, s.responses
                );
                println!(
                    "words: {} ({} pairs), patterns: {}",
                    s.associated_words, s.associations, s.patterns
                );
            }
            text => {
                if config.behavior.learning_enabled {
                    learner.learn(&mut store, text);
                }
                let draft = generator.generate(&store, Some(text), &mut entropy);
                let reply = humanizer.humanize(&draft, &store, &mut entropy);
                println!("Mimic: {}", reply);
            }
        }
    }

    store.save(&config.corpus.path);
    Ok(())
}
