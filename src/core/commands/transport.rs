use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Message not found")]
    NotFound,

    #[error("Transport error: {0}")]
    Other(String),
}

/// Outbound effects on the chat platform.
///
/// The core only ever talks to the platform through this trait; the Discord
/// layer implements it on top of serenity's HTTP client.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Post a text message, returning the new message's ID.
    async fn send_text(&self, channel_id: u64, text: &str) -> Result<u64, TransportError>;

    /// Upload a file with a caption, returning the new message's ID.
    async fn send_file(
        &self,
        channel_id: u64,
        path: &Path,
        caption: &str,
    ) -> Result<u64, TransportError>;

    async fn delete_message(&self, channel_id: u64, message_id: u64)
        -> Result<(), TransportError>;

    /// Look a message up, returning its ID if it still exists.
    async fn fetch_message(&self, channel_id: u64, message_id: u64)
        -> Result<u64, TransportError>;
}
