// ChatTransport over serenity's HTTP client. The core never sees serenity
// types; everything is translated to plain IDs and TransportError here.

use crate::core::commands::{ChatTransport, TransportError};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::path::Path;
use std::sync::Arc;

pub struct SerenityTransport {
    http: Arc<serenity::Http>,
}

impl SerenityTransport {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

fn convert(err: serenity::Error) -> TransportError {
    if let serenity::Error::Http(http_err) = &err {
        if http_err.status_code().map(|s| s.as_u16()) == Some(404) {
            return TransportError::NotFound;
        }
    }
    TransportError::Other(err.to_string())
}

#[async_trait]
impl ChatTransport for SerenityTransport {
    async fn send_text(&self, channel_id: u64, text: &str) -> Result<u64, TransportError> {
        let message = serenity::ChannelId::new(channel_id)
            .say(&self.http, text)
            .await
            .map_err(convert)?;
        Ok(message.id.get())
    }

    async fn send_file(
        &self,
        channel_id: u64,
        path: &Path,
        caption: &str,
    ) -> Result<u64, TransportError> {
        let attachment = serenity::CreateAttachment::path(path)
            .await
            .map_err(convert)?;
        let message = serenity::ChannelId::new(channel_id)
            .send_message(
                &self.http,
                serenity::CreateMessage::new()
                    .content(caption)
                    .add_file(attachment),
            )
            .await
            .map_err(convert)?;
        Ok(message.id.get())
    }

    async fn delete_message(
        &self,
        channel_id: u64,
        message_id: u64,
    ) -> Result<(), TransportError> {
        serenity::ChannelId::new(channel_id)
            .delete_message(&self.http, serenity::MessageId::new(message_id))
            .await
            .map_err(convert)
    }

    async fn fetch_message(
        &self,
        channel_id: u64,
        message_id: u64,
    ) -> Result<u64, TransportError> {
        let message = serenity::ChannelId::new(channel_id)
            .message(&self.http, serenity::MessageId::new(message_id))
            .await
            .map_err(convert)?;
        Ok(message.id.get())
    }
}
