// The message pipeline: every non-bot message is appended to its channel log,
// image attachments are archived, and `!log`/`!removelog` are routed.
//
// NO Discord dependencies here. The Discord layer hands in an InboundMessage
// and a ChatTransport; failures are logged and never bubble up raw.

use super::archive_models::{format_log_line, InboundMessage};
use super::log_book::LogBook;
use super::media_archiver::{AttachmentFetcher, MediaArchiver, MediaUpload};
use crate::core::commands::{ChatTransport, CommandOutcome, CommandRouter};
use chrono::NaiveDateTime;
use std::path::PathBuf;

/// What happened to one message. Mostly useful for tests and debug logging.
#[derive(Debug, Default)]
pub struct MessageReport {
    pub logged: bool,
    pub saved_media: Vec<PathBuf>,
    pub failed_media: Vec<String>,
    pub command: Option<CommandOutcome>,
}

pub struct ArchiveService<F: AttachmentFetcher> {
    logs: LogBook,
    media: MediaArchiver,
    fetcher: F,
    router: CommandRouter,
}

impl<F: AttachmentFetcher> ArchiveService<F> {
    pub fn new(logs: LogBook, media: MediaArchiver, fetcher: F, router: CommandRouter) -> Self {
        Self {
            logs,
            media,
            fetcher,
            router,
        }
    }

    pub fn logs(&self) -> &LogBook {
        &self.logs
    }

    pub async fn handle_message(
        &self,
        transport: &dyn ChatTransport,
        message: &InboundMessage,
        now: NaiveDateTime,
    ) -> MessageReport {
        let mut report = MessageReport::default();

        if message.author.is_bot {
            return report;
        }

        let line = format_log_line(message, now);
        match self.logs.append(&message.location, now, &line).await {
            Ok(()) => {
                report.logged = true;
                tracing::debug!(
                    scope = %message.location.scope,
                    subscope = %message.location.subscope,
                    "{}",
                    line
                );
            }
            Err(e) => tracing::warn!(
                scope = %message.location.scope,
                subscope = %message.location.subscope,
                "Dropping log line: {}",
                e
            ),
        }

        self.archive_attachments(transport, message, now, &mut report)
            .await;

        match self.router.route(transport, &self.logs, message).await {
            Ok(outcome) => report.command = outcome,
            Err(e) => tracing::warn!(
                channel_id = message.location.channel_id,
                "Command response failed: {}",
                e
            ),
        }

        report
    }

    async fn archive_attachments(
        &self,
        transport: &dyn ChatTransport,
        message: &InboundMessage,
        now: NaiveDateTime,
        report: &mut MessageReport,
    ) {
        for attachment in message.attachments.iter().filter(|a| a.is_image()) {
            let saved = match self.fetcher.fetch(&attachment.url).await {
                Ok(bytes) => {
                    self.media
                        .save(MediaUpload {
                            bytes: &bytes,
                            mime_type: attachment.content_type.as_deref(),
                            file_name: &attachment.file_name,
                            scope: &message.location.scope,
                            subscope: &message.location.subscope,
                            author_name: &message.author.name,
                            author_id: message.author.id,
                            now,
                        })
                        .await
                }
                Err(e) => Err(e),
            };

            match saved {
                Ok(Some(path)) => report.saved_media.push(path),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        file_name = %attachment.file_name,
                        size = attachment.size,
                        "Failed to archive attachment: {}",
                        e
                    );
                    report.failed_media.push(attachment.file_name.clone());

                    let notice = format!("Failed to save attachment {}.", attachment.file_name);
                    if let Err(e) = transport
                        .send_text(message.location.channel_id, &notice)
                        .await
                    {
                        tracing::warn!("Failed to report attachment failure: {}", e);
                    }
                }
            }
        }
    }
}
