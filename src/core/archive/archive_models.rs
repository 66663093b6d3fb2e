use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================
// Every I/O failure inside the archive is converted into one of these kinds at
// the component boundary. Nothing raw leaks to the Discord layer.

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Storage unavailable at {path}: {source}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Write to {path} failed: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Attachment transfer failed: {0}")]
    TransferFailure(String),

    #[error("User record {user_id} is corrupt: {reason}")]
    RecordCorrupt { user_id: String, reason: String },
}

// ============================================================================
// LAYOUT
// ============================================================================

/// Which tree a path is resolved under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
    Logs,
    Media,
}

/// How long a single log file stays current before a new one begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Day,
    Hour,
}

impl Rotation {
    /// File stem for the bucket containing `now`, e.g. `2024-01-01` or `2024-01-01_23`.
    pub fn bucket_name(&self, now: chrono::NaiveDateTime) -> String {
        match self {
            Rotation::Day => now.format("%Y-%m-%d").to_string(),
            Rotation::Hour => now.format("%Y-%m-%d_%H").to_string(),
        }
    }
}

impl std::str::FromStr for Rotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" => Ok(Rotation::Day),
            "hour" | "hourly" => Ok(Rotation::Hour),
            other => Err(format!("unknown rotation '{}', expected 'day' or 'hour'", other)),
        }
    }
}

/// The open log file a sink is writing to. Identity is the derived path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDestination {
    pub scope: String,
    pub subscope: String,
    pub path: PathBuf,
}

// ============================================================================
// INBOUND MESSAGES
// ============================================================================
// Platform-neutral snapshot of a chat message. The Discord layer builds these
// from serenity types so the core never sees them.

/// Where a message was posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLocation {
    /// Guild ID, or `None` for direct messages.
    pub scope_id: Option<u64>,
    /// Guild name, or `"DMs"`.
    pub scope: String,
    pub channel_id: u64,
    /// Channel name, or the DM channel ID.
    pub subscope: String,
}

pub const DIRECT_MESSAGE_SCOPE: &str = "DMs";

impl ChatLocation {
    /// DM channels have no name, so each one is filed under its ID.
    pub fn direct_message(channel_id: u64) -> Self {
        Self {
            scope_id: None,
            scope: DIRECT_MESSAGE_SCOPE.to_string(),
            channel_id,
            subscope: channel_id.to_string(),
        }
    }

    /// Stable identity of the scope: the guild, or the DM channel itself.
    pub fn scope_key(&self) -> String {
        match self.scope_id {
            Some(guild_id) => format!("guild:{}", guild_id),
            None => format!("dm:{}", self.channel_id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessageAuthor {
    pub id: u64,
    pub name: String,
    pub is_bot: bool,
}

#[derive(Debug, Clone)]
pub struct InboundAttachment {
    pub file_name: String,
    pub content_type: Option<String>,
    pub url: String,
    pub size: u32,
}

impl InboundAttachment {
    pub fn is_image(&self) -> bool {
        is_image_mime(self.content_type.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub message_id: u64,
    pub author: MessageAuthor,
    pub location: ChatLocation,
    pub content: String,
    pub attachments: Vec<InboundAttachment>,
}

/// Only `image/*` attachments are archived.
pub fn is_image_mime(mime_type: Option<&str>) -> bool {
    mime_type
        .map(|m| m.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false)
}

/// Render the single line appended to the channel log for a message.
pub fn format_log_line(message: &InboundMessage, now: chrono::NaiveDateTime) -> String {
    let body = if message.content.is_empty() {
        "Sent a File".to_string()
    } else {
        message.content.clone()
    };

    let mut line = format!(
        "[{}] {}: {}",
        now.format("%Y-%m-%d %H:%M:%S%.6f"),
        message.author.name,
        body
    );

    if !message.attachments.is_empty() {
        let names: Vec<&str> = message
            .attachments
            .iter()
            .map(|a| a.file_name.as_str())
            .collect();
        line.push_str(&format!(" [attachments: {}]", names.join(", ")));
    }

    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn message(content: &str, attachments: Vec<InboundAttachment>) -> InboundMessage {
        InboundMessage {
            message_id: 1,
            author: MessageAuthor {
                id: 7,
                name: "alice".to_string(),
                is_bot: false,
            },
            location: ChatLocation::direct_message(3),
            content: content.to_string(),
            attachments,
        }
    }

    #[test]
    fn bucket_names_follow_rotation() {
        assert_eq!(Rotation::Day.bucket_name(at(23, 59)), "2024-01-01");
        assert_eq!(Rotation::Hour.bucket_name(at(9, 5)), "2024-01-01_09");
    }

    #[test]
    fn rotation_parses_from_config_strings() {
        assert_eq!("day".parse::<Rotation>().unwrap(), Rotation::Day);
        assert_eq!(" Hourly ".parse::<Rotation>().unwrap(), Rotation::Hour);
        assert!("weekly".parse::<Rotation>().is_err());
    }

    #[test]
    fn image_mime_check_is_a_prefix_check() {
        assert!(is_image_mime(Some("image/png")));
        assert!(is_image_mime(Some("IMAGE/JPEG")));
        assert!(!is_image_mime(Some("text/plain")));
        assert!(!is_image_mime(Some("application/image")));
        assert!(!is_image_mime(None));
    }

    #[test]
    fn log_line_uses_placeholder_for_empty_content() {
        let attachment = InboundAttachment {
            file_name: "cat.png".to_string(),
            content_type: Some("image/png".to_string()),
            url: "https://cdn.example/cat.png".to_string(),
            size: 10,
        };
        let line = format_log_line(&message("", vec![attachment]), at(12, 0));
        assert_eq!(
            line,
            "[2024-01-01 12:00:00.000000] alice: Sent a File [attachments: cat.png]"
        );
    }

    #[test]
    fn scope_key_distinguishes_dm_channels() {
        let guild = ChatLocation {
            scope_id: Some(10),
            scope: "Guild".to_string(),
            channel_id: 99,
            subscope: "general".to_string(),
        };
        assert_eq!(guild.scope_key(), "guild:10");
        assert_ne!(
            ChatLocation::direct_message(1).scope_key(),
            ChatLocation::direct_message(2).scope_key()
        );
    }
}
