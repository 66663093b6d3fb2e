// Runtime configuration, read from the environment (and `.env` via dotenv).
//
// Parsing goes through `from_lookup` so tests can feed a plain map instead of
// mutating the real process environment.

use crate::core::archive::Rotation;
use chrono_tz::Tz;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_ARCHIVE_ROOT: &str = "Discord_Logging";
const DEFAULT_SNAPSHOT_MINUTES: u64 = 120;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing {0} environment variable! Create a .env file with your bot token.")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub token: String,
    pub privileged_users: HashSet<u64>,
    pub archive_root: PathBuf,
    pub rotation: Rotation,
    pub snapshot_interval: Duration,
    pub timezone: Tz,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token = get("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let privileged_users = match get("PRIVILEGED_USER_IDS") {
            Some(list) => parse_user_ids("PRIVILEGED_USER_IDS", &list)?,
            // AUTHOR_ID is the old single-owner setting.
            None => match get("AUTHOR_ID") {
                Some(id) => parse_user_ids("AUTHOR_ID", &id)?,
                None => HashSet::new(),
            },
        };

        let archive_root = get("ARCHIVE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ARCHIVE_ROOT));

        let rotation = match get("LOG_ROTATION") {
            Some(raw) => raw.parse::<Rotation>().map_err(|reason| ConfigError::Invalid {
                key: "LOG_ROTATION",
                reason,
            })?,
            None => Rotation::default(),
        };

        let snapshot_minutes = match get("SNAPSHOT_INTERVAL_MINUTES") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|m| *m > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    key: "SNAPSHOT_INTERVAL_MINUTES",
                    reason: format!("'{}' is not a positive number of minutes", raw),
                })?,
            None => DEFAULT_SNAPSHOT_MINUTES,
        };

        let timezone = match get("ARCHIVE_TIMEZONE") {
            Some(raw) => raw.trim().parse::<Tz>().map_err(|e| ConfigError::Invalid {
                key: "ARCHIVE_TIMEZONE",
                reason: e.to_string(),
            })?,
            None => chrono_tz::UTC,
        };

        let snapshot_secs = snapshot_minutes
            .checked_mul(60)
            .ok_or_else(|| ConfigError::Invalid {
                key: "SNAPSHOT_INTERVAL_MINUTES",
                reason: format!("{} minutes is too long", snapshot_minutes),
            })?;

        Ok(Self {
            token,
            privileged_users,
            archive_root,
            rotation,
            snapshot_interval: Duration::from_secs(snapshot_secs),
            timezone,
        })
    }
}

fn parse_user_ids(key: &'static str, raw: &str) -> Result<HashSet<u64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>().map_err(|_| ConfigError::Invalid {
                key,
                reason: format!("'{}' is not a user ID", s),
            })
        })
        .collect()
}
