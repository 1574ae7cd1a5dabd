//! Idle-conversation initiator
//!
//! A long-lived task that now and then breaks the silence in monitored
//! conversations nobody has written in for a while.

use mimic_core::config::InitiatorConfig;
use mimic_core::ConversationId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::ChatAgent;

pub struct IdleInitiator {
    agent: Arc<ChatAgent>,
    config: InitiatorConfig,
}

impl IdleInitiator {
    pub fn new(agent: Arc<ChatAgent>, config: InitiatorConfig) -> Self {
        Self { agent, config }
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped).
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Idle initiator started");
            loop {
                let sent = self.check_all().await;
                if sent > 0 {
                    tracing::debug!("Idle initiator sent {} message(s)", sent);
                }

                let wait = self.next_check_interval().await;
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("Idle initiator stopped");
        })
    }

    async fn next_check_interval(&self) -> Duration {
        let range = self.config.check_interval;
        self.agent.with_entropy_mut(|e| range.sample(e)).await
    }

    /// One pass over every monitored conversation. Returns how many
    /// unprompted messages were sent.
    pub async fn check_all(&self) -> usize {
        let mut sent = 0;
        for conversation in self.agent.monitored().await {
            if self.should_initiate(&conversation).await && self.initiate(&conversation).await {
                sent += 1;
            }
        }
        sent
    }

    /// Idle longer than a fresh random threshold, then a coin flip.
    async fn should_initiate(&self, conversation: &ConversationId) -> bool {
        let idle = self.agent.idle_for(conversation).await;
        let threshold = self.config.idle_threshold;
        let probability = self.config.probability;
        self.agent
            .with_entropy_mut(|e| {
                let threshold = threshold.sample(&mut *e);
                // never-active conversations count as idle
                let idle_enough = idle.map_or(true, |idle| idle > threshold);
                idle_enough && e.chance(probability)
            })
            .await
    }

    async fn initiate(&self, conversation: &ConversationId) -> bool {
        let message = self
            .agent
            .compose_opener(self.config.greeting_probability)
            .await;

        let typing_probability = self.agent.behavior().typing_probability;
        let range = self.config.typing_delay;
        let typing = self
            .agent
            .with_entropy_mut(|e| e.chance(typing_probability).then(|| range.sample(e)))
            .await;

        let transport = self.agent.transport();
        if let Some(delay) = typing {
            if let Err(e) = transport.show_typing(conversation, delay).await {
                tracing::warn!("Typing indicator failed in {}: {:#}", conversation, e);
            }
            tokio::time::sleep(delay).await;
        }

        match transport.send_text(conversation, &message).await {
            Ok(()) => {
                tracing::info!("Started conversation in {}: {}", conversation, message);
                self.agent.touch(conversation).await;
                true
            }
            Err(e) => {
                tracing::error!("Failed to start conversation in {}: {:#}", conversation, e);
                false
            }
        }
    }
}
