use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId, MessageId};

use super::queue::{LoopMode, QueueItem};

/// Referencia opaca a un mensaje enviado
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoticeHandle {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

/// Avisos que el motor envía al canal de texto de la sesión.
/// Solo `NowPlaying` lleva los botones del reproductor.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    NowPlaying { item: QueueItem, loop_mode: LoopMode },
    TrackFailed { title: String, reason: String },
    HydrationSummary { playlist: String, added: usize, failed: usize },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, guild_id: GuildId, notice: Notice) -> anyhow::Result<NoticeHandle>;

    async fn delete(&self, handle: NoticeHandle);
}
