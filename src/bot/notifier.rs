use async_trait::async_trait;
use dashmap::DashMap;
use serenity::{
    builder::CreateMessage,
    http::Http,
    model::id::{ChannelId, GuildId},
};
use std::sync::Arc;
use tracing::debug;

use crate::{
    audio::notice::{Notice, NoticeHandle, Notifier},
    ui::{buttons, embeds},
};

/// Envía los avisos del motor al canal de texto donde se usó el último comando
pub struct DiscordNotifier {
    http: Arc<Http>,
    channels: DashMap<GuildId, ChannelId>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            channels: DashMap::new(),
        }
    }

    /// Recuerda el canal de texto del servidor
    pub fn bind(&self, guild_id: GuildId, channel_id: ChannelId) {
        self.channels.insert(guild_id, channel_id);
    }

    pub fn forget(&self, guild_id: GuildId) {
        self.channels.remove(&guild_id);
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, guild_id: GuildId, notice: Notice) -> anyhow::Result<NoticeHandle> {
        let channel_id = self
            .channels
            .get(&guild_id)
            .map(|c| *c)
            .ok_or_else(|| anyhow::anyhow!("Guild {} sin canal de texto asociado", guild_id))?;

        let mut message = CreateMessage::new().embed(embeds::notice_embed(&notice));
        if let Notice::NowPlaying { loop_mode, .. } = &notice {
            message = message.components(buttons::create_player_buttons(*loop_mode));
        }

        let sent = channel_id.send_message(self.http.as_ref(), message).await?;
        Ok(NoticeHandle {
            channel_id,
            message_id: sent.id,
        })
    }

    async fn delete(&self, handle: NoticeHandle) {
        // El mensaje pudo haber sido borrado a mano
        if let Err(e) = handle
            .channel_id
            .delete_message(self.http.as_ref(), handle.message_id)
            .await
        {
            debug!("No se pudo borrar el aviso {}: {}", handle.message_id, e);
        }
    }
}
