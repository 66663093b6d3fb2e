// Member and presence events: turn whatever the event carries into an
// ObservedMember and let the user store diff it.

use crate::core::users::{ObservedMember, UserChange};
use crate::discord::Data;
use poise::serenity_prelude::{self as serenity, Context};

pub async fn handle_member_join(ctx: &Context, data: &Data, member: &serenity::Member) {
    if member.user.bot {
        return;
    }

    let scope = guild_name(ctx, member.guild_id);
    let observed = ObservedMember::new(member.user.id.get(), scope, member.user.name.clone())
        .with_nickname(member.nick.clone());

    upsert(data, observed).await;
}

pub async fn handle_member_update(
    ctx: &Context,
    data: &Data,
    event: &serenity::GuildMemberUpdateEvent,
) {
    if event.user.bot {
        return;
    }

    let scope = guild_name(ctx, event.guild_id);
    let observed = ObservedMember::new(event.user.id.get(), scope, event.user.name.clone())
        .with_nickname(event.nick.clone());

    upsert(data, observed).await;
}

pub async fn handle_presence_update(ctx: &Context, data: &Data, presence: &serenity::Presence) {
    let guild_id = match presence.guild_id {
        Some(id) => id,
        None => return,
    };
    if presence.user.bot == Some(true) {
        return;
    }

    let user_id = presence.user.id;
    // Pull what the cache knows about the member; the guard must not live past this block.
    let (scope, name, nickname, is_bot) = {
        let guild = match ctx.cache.guild(guild_id) {
            Some(g) => g,
            None => return,
        };
        let member = guild.members.get(&user_id);
        (
            guild.name.clone(),
            member.map(|m| m.user.name.clone()),
            member.map(|m| m.nick.clone()),
            member.map(|m| m.user.bot).unwrap_or(false),
        )
    };
    if is_bot {
        return;
    }

    let name = name
        .or_else(|| presence.user.name.clone())
        .unwrap_or_default();
    let mut observed = observe_presence(user_id.get(), scope, name, presence);
    if let Some(nickname) = nickname {
        observed = observed.with_nickname(nickname);
    }

    upsert(data, observed).await;
}

/// Status and custom status as carried by a presence.
pub fn observe_presence(
    user_id: u64,
    scope: String,
    name: String,
    presence: &serenity::Presence,
) -> ObservedMember {
    let (status, custom_status) = presence_fields(presence);
    ObservedMember::new(user_id, scope, name)
        .with_status(Some(status))
        .with_custom_status(custom_status)
}

pub fn presence_fields(presence: &serenity::Presence) -> (String, Option<String>) {
    (
        presence.status.name().to_string(),
        custom_status(&presence.activities),
    )
}

/// The custom status text if set, otherwise the first activity's name.
fn custom_status(activities: &[serenity::Activity]) -> Option<String> {
    activities
        .iter()
        .find(|a| a.kind == serenity::ActivityType::Custom)
        .and_then(|a| a.state.clone())
        .or_else(|| activities.first().map(|a| a.name.clone()))
}

fn guild_name(ctx: &Context, guild_id: serenity::GuildId) -> String {
    guild_id.name(ctx).unwrap_or_else(|| guild_id.to_string())
}

async fn upsert(data: &Data, observed: ObservedMember) {
    match data.users.upsert(&observed).await {
        Ok(changes) => log_changes(&observed, &changes),
        Err(e) => tracing::warn!(
            user_id = observed.user_id,
            scope = %observed.scope,
            "Failed to persist user record: {}",
            e
        ),
    }
}

fn log_changes(observed: &ObservedMember, changes: &[UserChange]) {
    let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "None".to_string());

    for change in changes {
        match change {
            UserChange::Nickname { old, new } => tracing::info!(
                scope = %observed.scope,
                "Nickname changed for {}: {} -> {}",
                observed.name,
                show(old),
                show(new)
            ),
            UserChange::Status { old, new } => tracing::info!(
                scope = %observed.scope,
                "Status changed for {}: {} -> {}",
                observed.name,
                show(old),
                show(new)
            ),
            UserChange::CustomStatus { old, new } => tracing::debug!(
                scope = %observed.scope,
                "Custom status changed for {}: {} -> {}",
                observed.name,
                show(old),
                show(new)
            ),
            UserChange::Name { old, new } => {
                tracing::info!("Username changed: {} -> {}", old, new)
            }
            UserChange::FirstSeen { scope } => {
                tracing::debug!(user_id = observed.user_id, %scope, "First observation")
            }
        }
    }
}
