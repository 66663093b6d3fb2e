use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything we remember about one user, stored as `{user_id}.json`.
///
/// Records are guild-scoped: each guild the user was seen in keeps its own
/// nickname, nickname history and presence. Unknown fields from older files
/// are ignored on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub name: String,
    #[serde(default)]
    pub guilds: BTreeMap<String, GuildProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildProfile {
    #[serde(default)]
    pub nickname: Option<String>,
    /// Previous nicknames, oldest first. Never ends with the current one.
    #[serde(default)]
    pub nicknames: Vec<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub custom_status: Option<String>,
}

/// A member as seen by one event or sweep.
///
/// The outer `Option` on each attribute says whether the event carried that
/// attribute at all; presence events know the status but not the nickname,
/// member updates the other way round. Unseen attributes are left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedMember {
    pub user_id: u64,
    pub scope: String,
    pub name: String,
    pub nickname: Option<Option<String>>,
    pub status: Option<Option<String>>,
    pub custom_status: Option<Option<String>>,
}

impl ObservedMember {
    pub fn new(user_id: u64, scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id,
            scope: scope.into(),
            name: name.into(),
            nickname: None,
            status: None,
            custom_status: None,
        }
    }

    pub fn with_nickname(mut self, nickname: Option<String>) -> Self {
        self.nickname = Some(nickname);
        self
    }

    pub fn with_status(mut self, status: Option<String>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_custom_status(mut self, custom_status: Option<String>) -> Self {
        self.custom_status = Some(custom_status);
        self
    }
}

/// A single detected difference, reported back for operator logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserChange {
    FirstSeen {
        scope: String,
    },
    Name {
        old: String,
        new: String,
    },
    Nickname {
        old: Option<String>,
        new: Option<String>,
    },
    Status {
        old: Option<String>,
        new: Option<String>,
    },
    CustomStatus {
        old: Option<String>,
        new: Option<String>,
    },
}

impl GuildProfile {
    /// Adopt a new nickname, moving the old one into the history.
    pub fn set_nickname(&mut self, new: Option<String>) -> Option<UserChange> {
        if self.nickname == new {
            return None;
        }

        let old = self.nickname.take();
        match &old {
            Some(previous) => self.nicknames.push(previous.clone()),
            // Coming back from "no nickname" to the last one used: it is
            // current again, so it can't stay at the tail of the history.
            None => {
                if new.is_some() && self.nicknames.last() == new.as_ref() {
                    self.nicknames.pop();
                }
            }
        }
        self.nickname = new.clone();

        Some(UserChange::Nickname { old, new })
    }

    pub fn set_status(&mut self, new: Option<String>) -> Option<UserChange> {
        if self.status == new {
            return None;
        }
        let old = std::mem::replace(&mut self.status, new.clone());
        Some(UserChange::Status { old, new })
    }

    pub fn set_custom_status(&mut self, new: Option<String>) -> Option<UserChange> {
        if self.custom_status == new {
            return None;
        }
        let old = std::mem::replace(&mut self.custom_status, new.clone());
        Some(UserChange::CustomStatus { old, new })
    }
}

impl UserRecord {
    /// Fold an observation into the record, returning what changed.
    pub fn observe(&mut self, observed: &ObservedMember) -> Vec<UserChange> {
        let mut changes = Vec::new();

        if self.name != observed.name && !observed.name.is_empty() {
            if !self.name.is_empty() {
                changes.push(UserChange::Name {
                    old: self.name.clone(),
                    new: observed.name.clone(),
                });
            }
            self.name = observed.name.clone();
        }

        if !self.guilds.contains_key(&observed.scope) {
            changes.push(UserChange::FirstSeen {
                scope: observed.scope.clone(),
            });
        }
        let profile = self.guilds.entry(observed.scope.clone()).or_default();

        if let Some(nickname) = &observed.nickname {
            changes.extend(profile.set_nickname(nickname.clone()));
        }
        if let Some(status) = &observed.status {
            changes.extend(profile.set_status(status.clone()));
        }
        if let Some(custom_status) = &observed.custom_status {
            changes.extend(profile.set_custom_status(custom_status.clone()));
        }

        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nick(user: &mut UserRecord, nickname: Option<&str>) -> Vec<UserChange> {
        user.observe(
            &ObservedMember::new(1, "Guild1", "al").with_nickname(nickname.map(str::to_string)),
        )
    }

    fn profile(user: &UserRecord) -> &GuildProfile {
        user.guilds.get("Guild1").unwrap()
    }

    #[test]
    fn nickname_history_holds_only_previous_values() {
        let mut user = UserRecord::default();

        nick(&mut user, Some("N0"));
        nick(&mut user, Some("N1"));
        nick(&mut user, Some("N2"));

        assert_eq!(profile(&user).nickname.as_deref(), Some("N2"));
        assert_eq!(profile(&user).nicknames, vec!["N0", "N1"]);
    }

    #[test]
    fn first_observation_reports_first_seen_without_history() {
        let mut user = UserRecord::default();

        let changes = nick(&mut user, Some("Al"));

        assert_eq!(user.name, "al");
        assert!(changes.contains(&UserChange::FirstSeen {
            scope: "Guild1".to_string()
        }));
        assert!(profile(&user).nicknames.is_empty());
    }

    #[test]
    fn unchanged_observation_reports_nothing() {
        let mut user = UserRecord::default();
        nick(&mut user, Some("Al"));

        assert!(nick(&mut user, Some("Al")).is_empty());
        assert!(profile(&user).nicknames.is_empty());
    }

    #[test]
    fn restoring_a_cleared_nickname_keeps_invariant() {
        let mut user = UserRecord::default();
        nick(&mut user, Some("N0"));
        nick(&mut user, None);
        assert_eq!(profile(&user).nicknames, vec!["N0"]);

        nick(&mut user, Some("N0"));

        let p = profile(&user);
        assert_eq!(p.nickname.as_deref(), Some("N0"));
        assert_ne!(p.nicknames.last(), p.nickname.as_ref());
    }

    #[test]
    fn status_is_overwritten_not_historized() {
        let mut user = UserRecord::default();
        let observe = |status: &str| {
            ObservedMember::new(1, "Guild1", "al")
                .with_status(Some(status.to_string()))
                .with_custom_status(Some(format!("feeling {}", status)))
        };

        user.observe(&observe("online"));
        let changes = user.observe(&observe("idle"));

        assert_eq!(
            changes,
            vec![
                UserChange::Status {
                    old: Some("online".to_string()),
                    new: Some("idle".to_string()),
                },
                UserChange::CustomStatus {
                    old: Some("feeling online".to_string()),
                    new: Some("feeling idle".to_string()),
                },
            ]
        );
        assert_eq!(profile(&user).status.as_deref(), Some("idle"));
        assert!(profile(&user).nicknames.is_empty());
    }

    #[test]
    fn unseen_attributes_are_left_alone() {
        let mut user = UserRecord::default();
        nick(&mut user, Some("Al"));

        // A presence update carries status only.
        user.observe(&ObservedMember::new(1, "Guild1", "al").with_status(Some("dnd".into())));

        assert_eq!(profile(&user).nickname.as_deref(), Some("Al"));
        assert_eq!(profile(&user).status.as_deref(), Some("dnd"));
    }

    #[test]
    fn guilds_are_tracked_separately() {
        let mut user = UserRecord::default();
        user.observe(&ObservedMember::new(1, "A", "al").with_nickname(Some("InA".into())));
        user.observe(&ObservedMember::new(1, "B", "al").with_nickname(Some("InB".into())));

        assert_eq!(user.guilds["A"].nickname.as_deref(), Some("InA"));
        assert_eq!(user.guilds["B"].nickname.as_deref(), Some("InB"));
    }

    #[test]
    fn legacy_files_with_extra_fields_still_parse() {
        let json = r#"{
            "name": "al",
            "guilds": { "Guild1": { "nicknames": ["Al"], "statuses": ["No custom status"] } }
        }"#;

        let record: UserRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.guilds["Guild1"].nicknames, vec!["Al"]);
        assert_eq!(record.guilds["Guild1"].nickname, None);
    }
}
