use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use mimic_core::config::OneBotConfig;
use mimic_core::{ConversationId, IncomingMessage, Transport};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::event::{OneBotEvent, SendMessageAction, Target};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Longest wait between reconnect attempts
const MAX_BACKOFF_SECS: u64 = 30;

pub struct OneBotClient {
    tx: mpsc::Sender<String>, // outgoing JSON frames for the WS task
}

impl OneBotClient {
    /// Start the connection task. Incoming text messages arrive on the
    /// returned receiver; the task reconnects until the client is dropped.
    pub fn connect(config: &OneBotConfig) -> Result<(Self, mpsc::Receiver<IncomingMessage>)> {
        let ws_url = Self::endpoint(config)?;
        let (tx, mut rx) = mpsc::channel::<String>(32);
        let (incoming_tx, incoming_rx) = mpsc::channel::<IncomingMessage>(64);

        tokio::spawn(async move {
            let mut retry_count = 0u32;
            loop {
                if incoming_tx.is_closed() {
                    break;
                }
                tracing::info!("Connecting to OneBot at {}...", Self::redacted(&ws_url));
                match connect_async(ws_url.as_str()).await {
                    Ok((ws_stream, _)) => {
                        tracing::info!("Connected to OneBot");
                        retry_count = 0;
                        match Self::handle_connection(ws_stream, &mut rx, &incoming_tx).await {
                            Ok(Disconnect::Closed) => tracing::warn!("OneBot connection closed"),
                            Ok(Disconnect::Shutdown) => break,
                            Err(e) => tracing::error!("OneBot connection error: {:#}", e),
                        }
                    }
                    Err(e) => tracing::error!("Failed to connect to OneBot: {}", e),
                }

                let wait_secs = MAX_BACKOFF_SECS.min(2u64.pow(retry_count));
                tracing::info!("Reconnecting in {}s...", wait_secs);
                tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                if retry_count < 6 {
                    retry_count += 1;
                }
            }
            tracing::info!("OneBot connection task stopped");
        });

        Ok((Self { tx }, incoming_rx))
    }

    /// `ws_url` with the access token appended as a query parameter.
    fn endpoint(config: &OneBotConfig) -> Result<Url> {
        let mut url = Url::parse(&config.ws_url).context("Invalid OneBot WS URL")?;
        if let Some(token) = config.access_token.as_deref().filter(|t| !t.is_empty()) {
            url.query_pairs_mut().append_pair("access_token", token);
        }
        Ok(url)
    }

    fn redacted(url: &Url) -> String {
        let mut shown = url.clone();
        shown.set_query(None);
        shown.to_string()
    }

    async fn handle_connection(
        stream: WsStream,
        rx: &mut mpsc::Receiver<String>,
        incoming_tx: &mpsc::Sender<IncomingMessage>,
    ) -> Result<Disconnect> {
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                frame = read.next() => {
                    let Some(frame) = frame else {
                        return Ok(Disconnect::Closed);
                    };
                    match frame? {
                        Message::Text(text) => {
                            if let Some(message) = Self::decode(&text) {
                                if incoming_tx.send(message).await.is_err() {
                                    return Ok(Disconnect::Shutdown);
                                }
                            }
                        }
                        Message::Close(_) => return Ok(Disconnect::Closed),
                        _ => {}
                    }
                }

                outgoing = rx.recv() => {
                    let Some(json_payload) = outgoing else {
                        // client dropped
                        let _ = write.close().await;
                        return Ok(Disconnect::Shutdown);
                    };
                    write.send(Message::Text(json_payload)).await?;
                }
            }
        }
    }

    fn decode(text: &str) -> Option<IncomingMessage> {
        match serde_json::from_str::<OneBotEvent>(text) {
            Ok(event) => event.into_incoming(),
            Err(_) => {
                // heartbeats pass, but action responses carry no post_type
                tracing::trace!("Ignored non-event frame");
                None
            }
        }
    }

    pub async fn send_to(&self, target: Target, message: &str) -> Result<()> {
        let json = serde_json::to_string(&SendMessageAction::new(target, message))?;
        self.tx
            .send(json)
            .await
            .map_err(|_| anyhow::anyhow!("OneBot WS task dropped"))?;
        Ok(())
    }
}

enum Disconnect {
    /// Remote side went away, reconnect
    Closed,
    /// Our side is gone, stop for good
    Shutdown,
}

#[async_trait]
impl Transport for OneBotClient {
    async fn send_text(&self, conversation: &ConversationId, text: &str) -> Result<()> {
        let target: Target = conversation.as_str().parse()?;
        self.send_to(target, text).await
    }

    async fn show_typing(&self, conversation: &ConversationId, duration: Duration) -> Result<()> {
        // OneBot v11 has no typing action
        tracing::debug!("Typing in {} for {:.1}s", conversation, duration.as_secs_f64());
        Ok(())
    }
}
