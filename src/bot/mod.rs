//! # Bot Module
//!
//! Discord surface of XYZ Music.
//!
//! This module contains:
//! - Slash command registration ([`commands`]) and dispatch ([`handlers`])
//! - Voice connection management (songbird calls wrapped as transports)
//! - Voice-time tracking for the leveling store ([`events`])
//! - The notice channel binding used by the engine ([`notifier`])
//! - Background maintenance (stream cache purge, yt-dlp check)
//!
//! ## Architecture
//!
//! [`MusicBot`] implements Serenity's [`EventHandler`]. Playback state lives in
//! the [`AudioPlayer`]; the bot only translates interactions into engine calls
//! and engine results into replies.

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::{sync::Arc, time::Instant};
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod events;
pub mod handlers;
pub mod notifier;

use crate::{
    audio::{player::AudioPlayer, transport::SongbirdTransport},
    cache::StreamCache,
    config::Config,
    sources::ytdlp::YtDlpResolver,
    storage::LevelingStore,
};
use events::{VoiceTracker, VoiceTransition};
use notifier::DiscordNotifier;

const MAINTENANCE_INTERVAL_SECS: u64 = 600;

/// Main Discord bot handler.
///
/// Owns the playback engine, the leveling store and the notice channel
/// bindings shared with the engine.
pub struct MusicBot {
    config: Arc<Config>,
    pub player: AudioPlayer,
    pub store: Arc<LevelingStore>,
    pub notifier: Arc<DiscordNotifier>,
    voice: VoiceTracker,
    resolver: Arc<YtDlpResolver>,
}

impl MusicBot {
    pub fn new(
        config: Config,
        player: AudioPlayer,
        store: Arc<LevelingStore>,
        notifier: Arc<DiscordNotifier>,
        resolver: Arc<YtDlpResolver>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            player,
            store,
            notifier,
            voice: VoiceTracker::default(),
            resolver,
        }
    }

    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        match self.config.guild_id {
            Some(guild_id) => {
                commands::register_guild_commands(ctx, GuildId::new(guild_id)).await?;
                info!("✅ Comandos registrados en guild {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }
        Ok(())
    }

    /// Connects to a voice channel and attaches the call to the guild's session.
    ///
    /// When the session already has a transport the call just moves channels;
    /// the transport keeps the handle of the track it is playing.
    pub async fn join_voice_channel(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<()> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        let call = match manager.join(guild_id, channel_id).await {
            Ok(call) => call,
            Err(e) => {
                error!("Error al obtener handler de voz: {:?}", e);
                return Err(anyhow::anyhow!("Error al conectar al canal de voz"));
            }
        };

        if !self.player.is_connected(guild_id).await {
            let transport = SongbirdTransport::new(call)?;
            self.player.connect(guild_id, Arc::new(transport)).await;
        }

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);
        Ok(())
    }

    /// Tears the session down and leaves the call; `false` if there was nothing to leave
    pub async fn leave_voice_channel(&self, ctx: &Context, guild_id: GuildId) -> Result<bool> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        let had_session = self.player.teardown(guild_id).await?;
        let had_call = manager.get(guild_id).is_some();
        if had_call {
            manager.remove(guild_id).await?;
        }

        if had_session || had_call {
            info!("👋 Desconectado del canal de voz en guild {}", guild_id);
        }
        Ok(had_session || had_call)
    }

    async fn track_voice_time(&self, guild_id: GuildId, old: Option<&VoiceState>, new: &VoiceState) {
        let is_bot = new.member.as_ref().is_some_and(|m| m.user.bot);
        if is_bot {
            return;
        }

        let was_in_voice = old.and_then(|s| s.channel_id).is_some();
        let is_in_voice = new.channel_id.is_some();

        match self.voice.update(new.user_id, was_in_voice, is_in_voice, Instant::now()) {
            VoiceTransition::Left(elapsed) => {
                let secs = elapsed.as_secs();
                match self.store.add_voice_time(new.user_id, guild_id, secs).await {
                    Ok(stats) => info!(
                        "🎤 {} estuvo {}s en voz (nivel {})",
                        new.user_id, secs, stats.level
                    ),
                    Err(e) => warn!("⚠️ No se pudo guardar el tiempo de {}: {:?}", new.user_id, e),
                }
            }
            VoiceTransition::LeftUntracked => {
                debug!("🎤 {} salió sin entrada registrada", new.user_id);
            }
            VoiceTransition::Joined | VoiceTransition::Unchanged => {}
        }
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }

        let cache = self.player.stream_cache().clone();
        let resolver = self.resolver.clone();
        tokio::spawn(async move {
            maintenance_tasks(cache, resolver).await;
        });
    }

    /// Starts the voice timer of users already connected when the bot came online
    async fn cache_ready(&self, ctx: Context, guilds: Vec<GuildId>) {
        let now = Instant::now();
        for guild_id in guilds {
            let in_voice: Vec<_> = match guild_id.to_guild_cached(&ctx.cache) {
                Some(guild) => guild
                    .voice_states
                    .values()
                    .filter(|state| state.channel_id.is_some())
                    .filter(|state| {
                        !guild
                            .members
                            .get(&state.user_id)
                            .is_some_and(|m| m.user.bot)
                    })
                    .map(|state| state.user_id)
                    .collect(),
                None => continue,
            };

            for user_id in in_voice {
                self.voice.track(user_id, now);
            }
        }
        info!("🎤 {} usuarios en voz al iniciar", self.voice.tracked());
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command_interaction) => {
                if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                    error!("Error manejando comando: {:?}", e);
                }
            }
            Interaction::Component(component_interaction) => {
                if let Err(e) = handlers::handle_component(&ctx, component_interaction, self).await
                {
                    error!("Error manejando componente: {:?}", e);
                }
            }
            _ => {}
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };

        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id {
            self.track_voice_time(guild_id, old.as_ref(), &new).await;
            return;
        }

        // Bot fue desconectado
        if old.is_some() && new.channel_id.is_none() {
            info!("🔌 Bot desconectado en guild {}", guild_id);
            if let Err(e) = self.player.teardown(guild_id).await {
                error!("Error al cerrar la sesión: {:?}", e);
            }
            self.notifier.forget(guild_id);
        }
    }
}

/// Periodic housekeeping: purges expired streams and checks that yt-dlp still runs.
async fn maintenance_tasks(cache: StreamCache, resolver: Arc<YtDlpResolver>) {
    let mut interval =
        tokio::time::interval(tokio::time::Duration::from_secs(MAINTENANCE_INTERVAL_SECS));

    loop {
        interval.tick().await;

        cache.cleanup_old_entries();

        match resolver.verify().await {
            Ok(version) => debug!("✅ yt-dlp {}", version),
            Err(e) => warn!("Error verificando yt-dlp: {:?}", e),
        }

        info!("🧹 Tareas de mantenimiento completadas");
    }
}
