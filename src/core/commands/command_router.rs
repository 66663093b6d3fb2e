// Handles the two text commands privileged users can issue in chat:
//
// - `!log`       upload the channel's current log file
// - `!removelog` delete the last `!log` request and the bot's reply
//
// Everything else passes through untouched. The command message itself has
// already been logged by the time it gets here.

use super::transport::{ChatTransport, TransportError};
use crate::core::archive::{InboundMessage, LogBook};
use dashmap::DashMap;
use std::collections::HashSet;

pub const DENIED_TEXT: &str = "You don't have permission to use this command.";
pub const LOG_CAPTION: &str = "Here is your log file:";
pub const NO_LOG_TEXT: &str = "No log file is currently available.";
pub const SEND_FAILED_TEXT: &str = "Error sending log file.";
pub const NOTHING_TO_REMOVE_TEXT: &str = "There is no log response to remove.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Log,
    RemoveLog,
}

impl Command {
    /// Recognise a command from the first word of a message.
    pub fn parse(content: &str) -> Option<Self> {
        match content.split_whitespace().next()? {
            "!log" => Some(Command::Log),
            "!removelog" => Some(Command::RemoveLog),
            _ => None,
        }
    }
}

/// What a `!log` left behind, so `!removelog` can clean it up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingLogRequest {
    pub channel_id: u64,
    pub command_message_id: u64,
    pub reply_message_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Denied,
    LogSent { reply_message_id: u64 },
    NoLogAvailable,
    LogSendFailed,
    Removed { deleted: usize },
    NothingToRemove,
}

pub struct CommandRouter {
    privileged: HashSet<u64>,
    // Scope key -> last !log request in that scope
    pending: DashMap<String, PendingLogRequest>,
}

impl CommandRouter {
    pub fn new(privileged: impl IntoIterator<Item = u64>) -> Self {
        Self {
            privileged: privileged.into_iter().collect(),
            pending: DashMap::new(),
        }
    }

    pub fn is_privileged(&self, user_id: u64) -> bool {
        self.privileged.contains(&user_id)
    }

    #[cfg(test)]
    pub fn pending_for(&self, scope_key: &str) -> Option<PendingLogRequest> {
        self.pending.get(scope_key).map(|p| *p)
    }

    /// Run the command in `message`, if there is one.
    pub async fn route(
        &self,
        transport: &dyn ChatTransport,
        logs: &LogBook,
        message: &InboundMessage,
    ) -> Result<Option<CommandOutcome>, TransportError> {
        let command = match Command::parse(&message.content) {
            Some(c) => c,
            None => return Ok(None),
        };

        let channel_id = message.location.channel_id;

        if !self.is_privileged(message.author.id) {
            tracing::info!(
                user_id = message.author.id,
                command = ?command,
                "Denied command from unprivileged user"
            );
            transport.send_text(channel_id, DENIED_TEXT).await?;
            return Ok(Some(CommandOutcome::Denied));
        }

        let outcome = match command {
            Command::Log => self.send_log(transport, logs, message).await?,
            Command::RemoveLog => self.remove_log(transport, message).await?,
        };
        Ok(Some(outcome))
    }

    async fn send_log(
        &self,
        transport: &dyn ChatTransport,
        logs: &LogBook,
        message: &InboundMessage,
    ) -> Result<CommandOutcome, TransportError> {
        let channel_id = message.location.channel_id;

        let path = match logs.current_file(&message.location).await {
            Some(p) => p,
            None => {
                transport.send_text(channel_id, NO_LOG_TEXT).await?;
                return Ok(CommandOutcome::NoLogAvailable);
            }
        };

        match transport.send_file(channel_id, &path, LOG_CAPTION).await {
            Ok(reply_message_id) => {
                self.pending.insert(
                    message.location.scope_key(),
                    PendingLogRequest {
                        channel_id,
                        command_message_id: message.message_id,
                        reply_message_id,
                    },
                );
                Ok(CommandOutcome::LogSent { reply_message_id })
            }
            Err(e) => {
                tracing::error!(path = %path.display(), "Failed to send log file: {}", e);
                transport.send_text(channel_id, SEND_FAILED_TEXT).await?;
                Ok(CommandOutcome::LogSendFailed)
            }
        }
    }

    async fn remove_log(
        &self,
        transport: &dyn ChatTransport,
        message: &InboundMessage,
    ) -> Result<CommandOutcome, TransportError> {
        let pending = match self.pending.remove(&message.location.scope_key()) {
            Some((_, p)) => p,
            None => {
                transport
                    .send_text(message.location.channel_id, NOTHING_TO_REMOVE_TEXT)
                    .await?;
                return Ok(CommandOutcome::NothingToRemove);
            }
        };

        let mut deleted = 0;
        for message_id in [pending.reply_message_id, pending.command_message_id] {
            if delete_if_present(transport, pending.channel_id, message_id).await {
                deleted += 1;
            }
        }

        Ok(CommandOutcome::Removed { deleted })
    }
}

/// Best-effort delete; a message that is already gone is not an error.
async fn delete_if_present(transport: &dyn ChatTransport, channel_id: u64, message_id: u64) -> bool {
    let result = match transport.fetch_message(channel_id, message_id).await {
        Ok(_) => transport.delete_message(channel_id, message_id).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => true,
        Err(TransportError::NotFound) => false,
        Err(e) => {
            tracing::warn!(channel_id, message_id, "Failed to delete message: {}", e);
            false
        }
    }
}
