use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseFollowup,
        CreateInteractionResponseMessage, EditInteractionResponse,
    },
    http::HttpError,
    model::{
        application::{CommandInteraction, ComponentInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    audio::{
        player::EnqueueOutcome,
        queue::LoopMode,
        session::PlaybackState,
    },
    bot::MusicBot,
    storage::UserStats,
    ui::{buttons, embeds},
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MusicBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );
    bot.notifier.bind(guild_id, command.channel_id);

    let result = match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await,
        "pause" => handle_pause(ctx, &command, bot, guild_id).await,
        "resume" => handle_resume(ctx, &command, bot, guild_id).await,
        "skip" => handle_skip(ctx, &command, bot, guild_id).await,
        "stop" => handle_stop(ctx, &command, bot, guild_id).await,
        "queue" => handle_queue(ctx, &command, bot, guild_id).await,
        "nowplaying" => handle_nowplaying(ctx, &command, bot, guild_id).await,
        "loop" => handle_loop(ctx, &command, bot, guild_id).await,
        "volume" => handle_volume(ctx, &command, bot, guild_id).await,
        "join" => handle_join(ctx, &command, bot, guild_id).await,
        "leave" => handle_leave(ctx, &command, bot, guild_id).await,
        "level" => handle_level(ctx, &command, bot, guild_id).await,
        "profile" => handle_profile(ctx, &command, bot, guild_id).await,
        "ping" => handle_ping(ctx, &command).await,
        "setname" => handle_setname(ctx, &command, guild_id).await,
        "resetname" => handle_resetname(ctx, &command, guild_id).await,
        "about" => handle_about(ctx, &command, bot).await,
        "help" => reply(ctx, &command, CreateInteractionResponseMessage::new().embed(embeds::create_help_embed())).await,
        _ => Err(anyhow::anyhow!("Comando no reconocido")),
    };

    if let Err(e) = result {
        warn!("⚠️ /{} falló en guild {}: {}", command.data.name, guild_id, e);
        send_error(ctx, &command, &e.to_string()).await?;
    }

    Ok(())
}

/// Maneja interacciones con componentes (botones del reproductor y del perfil)
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    bot: &MusicBot,
) -> Result<()> {
    let guild_id = component
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Componente usado fuera de un servidor"))?;

    info!(
        "🔘 Botón {} presionado por {} en guild {}",
        component.data.custom_id, component.user.name, guild_id
    );

    if let Some(user_id) = buttons::parse_profile_refresh(&component.data.custom_id) {
        let embed = profile_embed(ctx, bot, guild_id, user_id).await?;
        component
            .create_response(
                &ctx.http,
                CreateInteractionResponse::UpdateMessage(
                    CreateInteractionResponseMessage::new()
                        .embed(embed)
                        .components(buttons::create_profile_buttons(user_id)),
                ),
            )
            .await?;
        return Ok(());
    }

    let result = match component.data.custom_id.as_str() {
        buttons::button_ids::PAUSE_RESUME => toggle_pause(bot, guild_id).await,
        buttons::button_ids::SKIP => bot
            .player
            .skip(guild_id)
            .await
            .map(|skipped| format!("⏭️ Saltada: **{}**", skipped.title))
            .map_err(Into::into),
        buttons::button_ids::LOOP => bot
            .player
            .toggle_loop(guild_id)
            .await
            .map(|mode| format!("🔁 {}", mode.label()))
            .map_err(Into::into),
        buttons::button_ids::STOP => bot
            .player
            .stop(guild_id)
            .await
            .map(|_| "⏹️ Reproducción detenida y cola limpiada".to_string())
            .map_err(Into::into),
        buttons::button_ids::QUEUE => {
            let current = bot.player.now_playing(guild_id).await;
            let page = bot.player.queue_page(guild_id, 1).await;
            component
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .embed(embeds::create_queue_embed(current.as_ref(), &page))
                            .ephemeral(true),
                    ),
                )
                .await?;
            return Ok(());
        }
        _ => Err(anyhow::anyhow!("Acción no reconocida")),
    };

    let message = match result {
        Ok(content) => CreateInteractionResponseMessage::new().content(content),
        Err(e) => CreateInteractionResponseMessage::new()
            .embed(embeds::create_error_embed("❌ Error", &e.to_string())),
    };
    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(message.ephemeral(true)),
        )
        .await?;

    Ok(())
}

async fn toggle_pause(bot: &MusicBot, guild_id: GuildId) -> Result<String> {
    let paused = bot
        .player
        .now_playing(guild_id)
        .await
        .is_some_and(|now| now.state == PlaybackState::Paused);

    if paused {
        bot.player.resume(guild_id).await?;
        Ok("▶️ Reproducción reanudada".to_string())
    } else {
        bot.player.pause(guild_id).await?;
        Ok("⏸️ Reproducción pausada".to_string())
    }
}

// Respuestas

async fn reply(
    ctx: &Context,
    command: &CommandInteraction,
    message: CreateInteractionResponseMessage,
) -> Result<()> {
    command
        .create_response(&ctx.http, CreateInteractionResponse::Message(message))
        .await?;
    Ok(())
}

/// Error efímero; si la interacción ya fue diferida se borra la respuesta y se usa un followup
async fn send_error(ctx: &Context, command: &CommandInteraction, description: &str) -> Result<()> {
    let embed = embeds::create_error_embed("❌ Error", description);
    let response = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .embed(embed.clone())
            .ephemeral(true),
    );

    if command.create_response(&ctx.http, response).await.is_err() {
        if let Err(e) = command.delete_response(&ctx.http).await {
            debug!("No se pudo borrar la respuesta diferida de /{}: {}", command.data.name, e);
        }
        command
            .create_followup(
                &ctx.http,
                CreateInteractionResponseFollowup::new()
                    .embed(embed)
                    .ephemeral(true),
            )
            .await?;
    }
    Ok(())
}

fn int_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

fn str_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn user_option(command: &CommandInteraction, name: &str) -> Option<UserId> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_user_id())
}

/// Canal de voz en el que está el usuario
fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Result<ChannelId> {
    let guild = guild_id
        .to_guild_cached(&ctx.cache)
        .ok_or_else(|| anyhow::anyhow!("Servidor no encontrado en caché"))?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|state| state.channel_id)
        .ok_or_else(|| anyhow::anyhow!("Debes estar en un canal de voz"))
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = str_option(command, "query")
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?;

    // Resolver puede tardar
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    if !bot.player.is_connected(guild_id).await {
        let voice_channel_id = get_user_voice_channel(ctx, guild_id, command.user.id)?;
        bot.join_voice_channel(ctx, guild_id, voice_channel_id).await?;
    }

    let embed = match bot.player.enqueue(guild_id, command.user.id, query).await? {
        EnqueueOutcome::Started { item } => {
            embeds::create_success_embed("▶️ Reproduciendo", &format!("**{}**", item.title))
        }
        EnqueueOutcome::Queued { item, position } => {
            embeds::create_track_added_embed(&item, position)
        }
        EnqueueOutcome::Playlist {
            title,
            first,
            pending,
            skipped,
            ..
        } => embeds::create_playlist_added_embed(&title, &first, pending, skipped),
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;
    Ok(())
}

async fn handle_pause(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let content = if bot.player.pause(guild_id).await? {
        "⏸️ Reproducción pausada"
    } else {
        "⏸️ La reproducción ya estaba en pausa"
    };
    reply(ctx, command, CreateInteractionResponseMessage::new().content(content)).await
}

async fn handle_resume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let content = if bot.player.resume(guild_id).await? {
        "▶️ Reproducción reanudada"
    } else {
        "▶️ La reproducción no estaba en pausa"
    };
    reply(ctx, command, CreateInteractionResponseMessage::new().content(content)).await
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let content = match int_option(command, "position") {
        Some(position) => {
            let index = usize::try_from(position).unwrap_or(0);
            let target = bot.player.skip_to(guild_id, index).await?;
            format!("⏭️ Saltando a **{}**", target.title)
        }
        None => {
            let skipped = bot.player.skip(guild_id).await?;
            format!("⏭️ Saltada: **{}**", skipped.title)
        }
    };
    reply(ctx, command, CreateInteractionResponseMessage::new().content(content)).await
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    bot.player.stop(guild_id).await?;
    reply(
        ctx,
        command,
        CreateInteractionResponseMessage::new().content("⏹️ Reproducción detenida y cola limpiada"),
    )
    .await
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let page = int_option(command, "page")
        .and_then(|p| usize::try_from(p).ok())
        .unwrap_or(1);

    let current = bot.player.now_playing(guild_id).await;
    let queue_page = bot.player.queue_page(guild_id, page).await;
    let embed = embeds::create_queue_embed(current.as_ref(), &queue_page);

    reply(ctx, command, CreateInteractionResponseMessage::new().embed(embed)).await
}

async fn handle_nowplaying(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(now) = bot.player.now_playing(guild_id).await else {
        return reply(
            ctx,
            command,
            CreateInteractionResponseMessage::new()
                .content("❌ No hay nada reproduciéndose actualmente")
                .ephemeral(true),
        )
        .await;
    };

    reply(
        ctx,
        command,
        CreateInteractionResponseMessage::new()
            .embed(embeds::create_progress_embed(&now))
            .components(buttons::create_player_buttons(now.loop_mode)),
    )
    .await
}

async fn handle_loop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let mode = match str_option(command, "mode") {
        Some(raw) => {
            let mode = LoopMode::parse(raw)
                .ok_or_else(|| anyhow::anyhow!("Modo de repetición inválido: {}", raw))?;
            bot.player.set_loop_mode(guild_id, mode).await?;
            mode
        }
        None => bot.player.toggle_loop(guild_id).await?,
    };

    let content = match mode {
        LoopMode::Track => "🔂 Repetir canción activado",
        LoopMode::Queue => "🔁 Repetir cola activado",
        LoopMode::Off => "➡️ Repetición desactivada",
    };
    reply(ctx, command, CreateInteractionResponseMessage::new().content(content)).await
}

async fn handle_volume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let content = match int_option(command, "level") {
        Some(level) => {
            let percent = level.clamp(0, 100) as u8;
            bot.player.set_volume(guild_id, percent).await?;
            format!("🔊 Volumen ajustado a {}%", percent)
        }
        None => {
            let current = bot.player.volume(guild_id).await;
            format!("🔊 Volumen actual: {}%", (current * 100.0).round() as u32)
        }
    };
    reply(ctx, command, CreateInteractionResponseMessage::new().content(content)).await
}

async fn handle_join(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let voice_channel_id = get_user_voice_channel(ctx, guild_id, command.user.id)?;
    bot.join_voice_channel(ctx, guild_id, voice_channel_id).await?;

    reply(
        ctx,
        command,
        CreateInteractionResponseMessage::new().content(format!("🔊 Conectado a <#{}>", voice_channel_id)),
    )
    .await
}

async fn handle_leave(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let message = if bot.leave_voice_channel(ctx, guild_id).await? {
        CreateInteractionResponseMessage::new().content("👋 Desconectado del canal de voz")
    } else {
        CreateInteractionResponseMessage::new()
            .embed(embeds::create_info_embed(
                "🔇 Sin conexión",
                "No estoy en ningún canal de voz",
            ))
            .ephemeral(true)
    };
    reply(ctx, command, message).await
}

async fn handle_level(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let user_id = user_option(command, "user").unwrap_or(command.user.id);
    let user = ctx.http.get_user(user_id).await?;
    let stats = bot
        .store
        .stats(user_id)
        .await
        .unwrap_or_else(|| UserStats::new(guild_id));

    reply(
        ctx,
        command,
        CreateInteractionResponseMessage::new().embed(embeds::create_level_embed(
            &user.name,
            &user.face(),
            &stats,
        )),
    )
    .await
}

async fn handle_profile(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let user_id = user_option(command, "user").unwrap_or(command.user.id);
    let embed = profile_embed(ctx, bot, guild_id, user_id).await?;

    reply(
        ctx,
        command,
        CreateInteractionResponseMessage::new()
            .embed(embed)
            .components(buttons::create_profile_buttons(user_id)),
    )
    .await
}

async fn profile_embed(
    ctx: &Context,
    bot: &MusicBot,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<CreateEmbed> {
    let user = ctx.http.get_user(user_id).await?;
    let stats = bot
        .store
        .stats(user_id)
        .await
        .unwrap_or_else(|| UserStats::new(guild_id));
    Ok(embeds::create_profile_embed(&user.name, &user.face(), &stats))
}

async fn handle_ping(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let started = Instant::now();
    reply(ctx, command, CreateInteractionResponseMessage::new().content("🏓 Pong!")).await?;
    let latency = started.elapsed().as_millis();

    command
        .edit_response(
            &ctx.http,
            EditInteractionResponse::new().content(format!("🏓 Pong! Latencia: {}ms", latency)),
        )
        .await?;
    Ok(())
}

async fn handle_setname(ctx: &Context, command: &CommandInteraction, guild_id: GuildId) -> Result<()> {
    let name = str_option(command, "name")
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Escribe el nuevo apodo"))?;

    set_nickname(ctx, guild_id, Some(name)).await?;
    info!("🏷️ Apodo cambiado a '{}' en guild {}", name, guild_id);

    reply(
        ctx,
        command,
        CreateInteractionResponseMessage::new().embed(embeds::create_success_embed(
            "✅ Apodo cambiado",
            &format!("Ahora me llamo **{}**", name),
        )),
    )
    .await
}

async fn handle_resetname(ctx: &Context, command: &CommandInteraction, guild_id: GuildId) -> Result<()> {
    set_nickname(ctx, guild_id, None).await?;
    info!("🏷️ Apodo restablecido en guild {}", guild_id);

    reply(
        ctx,
        command,
        CreateInteractionResponseMessage::new().embed(embeds::create_success_embed(
            "✅ Apodo restablecido",
            "Vuelvo a usar mi nombre de usuario",
        )),
    )
    .await
}

/// Cambia el apodo del bot; `None` lo restablece
async fn set_nickname(ctx: &Context, guild_id: GuildId, nickname: Option<&str>) -> Result<()> {
    match guild_id.edit_nickname(&ctx.http, nickname).await {
        Ok(()) => Ok(()),
        Err(serenity::Error::Http(HttpError::UnsuccessfulRequest(response)))
            if response.status_code.as_u16() == 403 =>
        {
            Err(anyhow::anyhow!("No tengo permiso para cambiar mi apodo"))
        }
        Err(e) => Err(e.into()),
    }
}

async fn handle_about(ctx: &Context, command: &CommandInteraction, bot: &MusicBot) -> Result<()> {
    let bot_name = ctx.cache.current_user().name.clone();
    let embed = embeds::create_about_embed(
        &bot_name,
        ctx.cache.guild_count(),
        bot.player.active_sessions(),
    );

    reply(ctx, command, CreateInteractionResponseMessage::new().embed(embed)).await
}
