// Message events: translate serenity's Message into the core's InboundMessage
// and hand it to the archive pipeline.

use crate::core::archive::{ChatLocation, InboundAttachment, InboundMessage, MessageAuthor};
use crate::discord::transport::SerenityTransport;
use crate::discord::Data;
use poise::serenity_prelude::{self as serenity, Context};

pub async fn handle_message(ctx: &Context, data: &Data, message: &serenity::Message) {
    // Ignore bot messages (including our own)
    if message.author.bot {
        return;
    }

    let inbound = to_inbound(ctx, message).await;
    let transport = SerenityTransport::new(ctx.http.clone());
    let now = data.clock.now();

    let report = data.archive.handle_message(&transport, &inbound, now).await;

    tracing::debug!(
        message_id = inbound.message_id,
        logged = report.logged,
        saved_media = report.saved_media.len(),
        failed_media = report.failed_media.len(),
        command = ?report.command,
        "Archived message"
    );
}

async fn to_inbound(ctx: &Context, message: &serenity::Message) -> InboundMessage {
    InboundMessage {
        message_id: message.id.get(),
        author: MessageAuthor {
            id: message.author.id.get(),
            name: message.author.name.clone(),
            is_bot: message.author.bot,
        },
        location: locate(ctx, message).await,
        content: message.content.clone(),
        attachments: message
            .attachments
            .iter()
            .map(|a| InboundAttachment {
                file_name: a.filename.clone(),
                content_type: a.content_type.clone(),
                url: a.url.clone(),
                size: a.size,
            })
            .collect(),
    }
}

/// Guild and channel names for a message; DMs land under "DMs/{channel_id}".
async fn locate(ctx: &Context, message: &serenity::Message) -> ChatLocation {
    let channel_id = message.channel_id;

    let guild_id = match message.guild_id {
        Some(id) => id,
        None => return ChatLocation::direct_message(channel_id.get()),
    };

    let scope = guild_id.name(ctx).unwrap_or_else(|| guild_id.to_string());
    let subscope = match channel_id.name(ctx).await {
        Ok(name) => name,
        Err(e) => {
            tracing::warn!(channel_id = channel_id.get(), "Could not resolve channel name: {}", e);
            channel_id.to_string()
        }
    };

    ChatLocation {
        scope_id: Some(guild_id.get()),
        scope,
        channel_id: channel_id.get(),
        subscope,
    }
}
