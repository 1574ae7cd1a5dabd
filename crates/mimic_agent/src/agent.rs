//! Chat Agent: ties the corpus, the generator and a transport together.
//!
//! Every arriving message is learned (when enabled) and, past a
//! probabilistic gate, answered from its own task after a human-looking
//! delay. The corpus lives behind one lock, so learning and the occasional
//! save are serialized while replies only need read access.

use mimic_core::config::{BehaviorConfig, MimicConfig};
use mimic_core::{ConversationId, Entropy, IncomingMessage, StdEntropy, Transport};
use mimic_corpus::{CorpusStats, CorpusStore, LearnOutcome, LearningEngine};
use mimic_expression::{Humanizer, ResponseGenerator};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Lock ordering (to prevent deadlocks):
///   save_lock → corpus → entropy
pub struct ChatAgent {
    /// Learned model, written only by `learn`
    corpus: RwLock<CorpusStore>,

    /// Where the corpus is persisted
    corpus_path: PathBuf,

    /// Held across snapshot and write so saves land in order
    save_lock: Mutex<()>,

    /// Shared random source for every probabilistic decision
    entropy: Mutex<Box<dyn Entropy>>,

    learner: LearningEngine,
    generator: ResponseGenerator,
    humanizer: Humanizer,

    behavior: BehaviorConfig,

    /// Conversations the agent may learn from and talk in
    monitored: RwLock<BTreeSet<ConversationId>>,

    /// Last time anything happened in a conversation
    last_activity: RwLock<HashMap<ConversationId, Instant>>,

    transport: Arc<dyn Transport>,
}

impl ChatAgent {
    /// Build an agent from config. Every monitored conversation starts
    /// with its activity stamped "now".
    pub fn new(config: &MimicConfig, corpus: CorpusStore, transport: Arc<dyn Transport>) -> Self {
        let learner = LearningEngine::new();
        let generator = ResponseGenerator::with_tokenizer(learner.tokenizer());
        let monitored: BTreeSet<ConversationId> = config.chats.monitored.iter().cloned().collect();
        let now = Instant::now();
        let last_activity = monitored.iter().map(|c| (c.clone(), now)).collect();

        Self {
            corpus: RwLock::new(corpus),
            corpus_path: config.corpus.path.clone(),
            save_lock: Mutex::new(()),
            entropy: Mutex::new(Box::new(StdEntropy::from_entropy())),
            learner,
            generator,
            humanizer: Humanizer::new(),
            behavior: config.behavior.clone(),
            monitored: RwLock::new(monitored),
            last_activity: RwLock::new(last_activity),
            transport,
        }
    }

    /// Replace the random source, e.g. with a seeded one.
    pub fn with_entropy(mut self, entropy: Box<dyn Entropy>) -> Self {
        self.entropy = Mutex::new(entropy);
        self
    }

    pub fn with_humanizer(mut self, humanizer: Humanizer) -> Self {
        self.humanizer = humanizer;
        self
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    // === Monitored conversations ===

    pub async fn is_monitored(&self, id: &ConversationId) -> bool {
        self.monitored.read().await.contains(id)
    }

    /// Returns false if the conversation was already monitored.
    pub async fn add_conversation(&self, id: ConversationId) -> bool {
        let added = self.monitored.write().await.insert(id.clone());
        if added {
            self.touch(&id).await;
            tracing::info!("Conversation {} added to monitored set", id);
        }
        added
    }

    /// Returns false if the conversation was not monitored.
    pub async fn remove_conversation(&self, id: &ConversationId) -> bool {
        let removed = self.monitored.write().await.remove(id);
        if removed {
            self.last_activity.write().await.remove(id);
            tracing::info!("Conversation {} removed from monitored set", id);
        }
        removed
    }

    pub async fn monitored(&self) -> Vec<ConversationId> {
        self.monitored.read().await.iter().cloned().collect()
    }

    // === Activity tracking ===

    pub async fn touch(&self, id: &ConversationId) {
        self.last_activity
            .write()
            .await
            .insert(id.clone(), Instant::now());
    }

    /// Time since the last activity, `None` if the conversation never had any.
    pub async fn idle_for(&self, id: &ConversationId) -> Option<Duration> {
        self.last_activity
            .read()
            .await
            .get(id)
            .map(|t| Instant::now().saturating_duration_since(*t))
    }

    // === Message intake ===

    /// Handle one arriving message.
    ///
    /// Unmonitored conversations are ignored entirely. Self-sent messages
    /// only refresh the activity timestamp. Returns the reply task if one
    /// was spawned.
    pub async fn on_message(self: &Arc<Self>, message: IncomingMessage) -> Option<JoinHandle<()>> {
        if !self.is_monitored(&message.conversation).await {
            tracing::debug!("Conversation {} is not monitored", message.conversation);
            return None;
        }
        self.touch(&message.conversation).await;

        if message.is_self {
            tracing::debug!("Skipping own message in {}", message.conversation);
            return None;
        }

        tracing::debug!(
            "Message from {} in {}: {}",
            message.sender,
            message.conversation,
            message.text
        );

        if self.behavior.learning_enabled && !message.text.is_empty() {
            self.learn(&message.text).await;
        }

        let respond = self
            .entropy
            .lock()
            .await
            .chance(self.behavior.response_probability);
        if !respond {
            return None;
        }

        tracing::debug!("Will reply in {}", message.conversation);
        let agent = Arc::clone(self);
        Some(tokio::spawn(async move {
            agent.reply(message.conversation, message.text).await;
        }))
    }

    /// Learn from `text`, then maybe persist the corpus.
    pub async fn learn(&self, text: &str) -> LearnOutcome {
        let outcome = {
            let mut corpus = self.corpus.write().await;
            self.learner.learn(&mut corpus, text)
        };
        let save = self
            .entropy
            .lock()
            .await
            .chance(self.behavior.save_probability);
        if save {
            self.save().await;
        }
        outcome
    }

    /// Delay, maybe show typing, generate, humanize and send.
    async fn reply(self: Arc<Self>, conversation: ConversationId, text: String) {
        let (delay, typing) = {
            let mut entropy = self.entropy.lock().await;
            (
                self.behavior.response_delay.sample(&mut **entropy),
                entropy.chance(self.behavior.typing_probability),
            )
        };

        if typing {
            if let Err(e) = self.transport.show_typing(&conversation, delay).await {
                tracing::warn!("Typing indicator failed in {}: {:#}", conversation, e);
            }
        }
        tokio::time::sleep(delay).await;

        let reply = self.compose_reply(Some(&text)).await;
        match self.transport.send_text(&conversation, &reply).await {
            Ok(()) => {
                tracing::info!("Replied in {}: {}", conversation, reply);
                self.touch(&conversation).await;
            }
            Err(e) => tracing::error!("Failed to reply in {}: {:#}", conversation, e),
        }
    }

    // === Composition ===

    /// Generated and humanized reply to `input` (or an unprompted line).
    pub async fn compose_reply(&self, input: Option<&str>) -> String {
        let corpus = self.corpus.read().await;
        let mut entropy = self.entropy.lock().await;
        let draft = self.generator.generate(&corpus, input, &mut **entropy);
        self.finish(&draft, &corpus, &mut **entropy)
    }

    /// Opening line for a quiet conversation: a plain greeting with
    /// `greeting_probability`, otherwise something from the corpus.
    pub async fn compose_opener(&self, greeting_probability: f64) -> String {
        let corpus = self.corpus.read().await;
        let mut entropy = self.entropy.lock().await;
        let draft = if entropy.chance(greeting_probability) {
            corpus.random_greeting(&mut **entropy)
        } else {
            self.generator.generate(&corpus, None, &mut **entropy)
        };
        self.finish(&draft, &corpus, &mut **entropy)
    }

    /// Humanize `draft`. A result without a single letter or digit (all
    /// punctuation stripped, a bare emoji) is replaced by a humanized greeting.
    fn finish(&self, draft: &str, corpus: &CorpusStore, entropy: &mut dyn Entropy) -> String {
        let reply = self.humanizer.humanize(draft, corpus, &mut *entropy);
        if has_words(&reply) {
            return reply.trim().to_string();
        }
        let greeting = corpus.random_greeting(&mut *entropy);
        let reply = self.humanizer.humanize(&greeting, corpus, &mut *entropy);
        if has_words(&reply) {
            reply.trim().to_string()
        } else {
            greeting
        }
    }

    /// Run `f` with the shared random source.
    pub async fn with_entropy_mut<T>(&self, f: impl FnOnce(&mut dyn Entropy) -> T) -> T {
        let mut entropy = self.entropy.lock().await;
        f(&mut **entropy)
    }

    pub fn behavior(&self) -> &BehaviorConfig {
        &self.behavior
    }

    // === Lifecycle ===

    /// Say hello in every monitored conversation.
    pub async fn greet_all(&self) {
        for conversation in self.monitored().await {
            let greeting = {
                let corpus = self.corpus.read().await;
                let mut entropy = self.entropy.lock().await;
                let greeting = corpus.random_greeting(&mut **entropy);
                self.finish(&greeting, &corpus, &mut **entropy)
            };
            match self.transport.send_text(&conversation, &greeting).await {
                Ok(()) => {
                    tracing::info!("Greeted {}: {}", conversation, greeting);
                    self.touch(&conversation).await;
                }
                Err(e) => tracing::error!("Failed to greet {}: {:#}", conversation, e),
            }
        }
    }

    pub async fn stats(&self) -> CorpusStats {
        self.corpus.read().await.stats()
    }

    /// Snapshot the corpus under the read lock, then write it off the lock
    /// with async file I/O. Failures are logged.
    pub async fn save(&self) {
        let _writer = self.save_lock.lock().await;
        let json = self.corpus.read().await.to_json();
        let json = match json {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize corpus: {}", e);
                return;
            }
        };

        if let Some(parent) = self.corpus_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::error!("Failed to create {}: {}", parent.display(), e);
                return;
            }
        }
        match tokio::fs::write(&self.corpus_path, json).await {
            Ok(()) => tracing::debug!("Corpus saved to {}", self.corpus_path.display()),
            Err(e) => tracing::error!(
                "Failed to save corpus to {}: {}",
                self.corpus_path.display(),
                e
            ),
        }
    }

    /// Persist the corpus before exit.
    pub async fn shutdown(&self) {
        self.save().await;
        let stats = self.stats().await;
        tracing::info!(
            "Corpus saved before shutdown ({} patterns, {} associated words)",
            stats.patterns,
            stats.associated_words
        );
    }
}

fn has_words(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}
