//! OneBot v11 transport over a forward WebSocket.

pub mod client;
pub mod event;

pub use client::OneBotClient;
pub use event::{OneBotEvent, Target};
