//! Gateway event handlers.
//!
//! Translates Discord events into the moderation core's vocabulary.

use tracing::debug;
use twilight_model::channel::Message;
use twilight_model::channel::message::MessageType;

use crate::automod::{InboundMessage, MessageAuthor};
use crate::automod::models::{GuildId, UserId};
use crate::bot::AppState;

/// Run a newly created message through AutoMod.
pub async fn on_message(state: &AppState, msg: &Message) {
    let inbound = inbound_message(msg);

    if let Some(category) = state.automod.handle_message(&inbound).await {
        debug!("Message {} removed for {}", msg.id, category);
    }
}

/// A member's roles changed or they left: their admin status may differ now.
pub fn on_member_changed(state: &AppState, guild_id: GuildId, user_id: UserId) {
    state.permissions.invalidate(guild_id, user_id);
}

/// Whether the message was generated by Discord rather than typed by a user.
fn is_system_message(kind: MessageType) -> bool {
    !matches!(kind, MessageType::Regular | MessageType::Reply)
}

fn inbound_message(msg: &Message) -> InboundMessage {
    let is_system = msg.author.system.unwrap_or(false) || is_system_message(msg.kind);
    let role_ids = msg
        .member
        .as_ref()
        .map(|member| member.roles.clone())
        .unwrap_or_default();

    if msg.guild_id.is_some() && msg.member.is_none() && !msg.author.bot {
        debug!("Guild message {} arrived without member data", msg.id);
    }

    InboundMessage {
        id: msg.id,
        guild_id: msg.guild_id,
        channel_id: msg.channel_id,
        author: MessageAuthor {
            id: msg.author.id,
            name: msg.author.global_name.clone().unwrap_or_else(|| msg.author.name.clone()),
            is_bot: msg.author.bot || is_system,
            role_ids,
        },
        content: msg.content.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_regular_messages_and_replies_are_user_content() {
        assert!(!is_system_message(MessageType::Regular));
        assert!(!is_system_message(MessageType::Reply));
        assert!(is_system_message(MessageType::UserJoin));
        assert!(is_system_message(MessageType::RecipientAdd));
    }
}
