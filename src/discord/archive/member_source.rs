use super::members::presence_fields;
use crate::core::users::{MemberSource, ObservedMember};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Status recorded for a cached member the cache holds no presence for.
pub const OFFLINE_STATUS: &str = "offline";

/// Lists every non-bot member in every cached guild, with presence if known.
pub struct CacheMemberSource {
    cache: Arc<serenity::Cache>,
}

impl CacheMemberSource {
    pub fn new(cache: Arc<serenity::Cache>) -> Self {
        Self { cache }
    }

    fn collect(&self) -> Vec<ObservedMember> {
        let mut observed = Vec::new();

        for guild_id in self.cache.guilds() {
            let guild = match self.cache.guild(guild_id) {
                Some(g) => g,
                None => continue,
            };

            for (user_id, member) in guild.members.iter() {
                if member.user.bot {
                    continue;
                }

                observed.push(observe_cached_member(
                    user_id.get(),
                    guild.name.clone(),
                    member.user.name.clone(),
                    member.nick.clone(),
                    guild.presences.get(user_id).map(presence_fields),
                ));
            }
        }

        observed
    }
}

/// A member as the cache sees it. Serenity drops a member's presence when
/// they go offline, so a missing presence means offline with no custom status.
pub fn observe_cached_member(
    user_id: u64,
    scope: String,
    name: String,
    nickname: Option<String>,
    presence: Option<(String, Option<String>)>,
) -> ObservedMember {
    let (status, custom_status) =
        presence.unwrap_or_else(|| (OFFLINE_STATUS.to_string(), None));

    ObservedMember::new(user_id, scope, name)
        .with_nickname(nickname)
        .with_status(Some(status))
        .with_custom_status(custom_status)
}

#[async_trait]
impl MemberSource for CacheMemberSource {
    async fn observe_members(&self) -> Vec<ObservedMember> {
        // Cache guards aren't Send, so gather everything synchronously.
        self.collect()
    }
}
