use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter},
};

use crate::{
    audio::{
        notice::Notice,
        progress::{format_duration, render_progress},
        queue::{LoopMode, QueueItem, QueuePage},
        session::{NowPlaying, PlaybackState},
    },
    storage::UserStats,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
    pub const LEVEL_GOLD: Colour = Colour::from_rgb(241, 196, 15);
    pub const PROFILE_PINK: Colour = Colour::from_rgb(253, 0, 97);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 XYZ Music";
const LEVEL_BAR_CELLS: usize = 10;

fn duration_label(item: &QueueItem) -> String {
    item.duration
        .map(format_duration)
        .unwrap_or_else(|| "🔴 En vivo".to_string())
}

/// Hora relativa en el formato de timestamps de Discord ("hace 5 minutos")
fn added_label(item: &QueueItem) -> String {
    format!("<t:{}:R>", item.added_at.timestamp())
}

fn loop_icon(mode: LoopMode) -> &'static str {
    match mode {
        LoopMode::Off => "▶️",
        LoopMode::Track => "🔂",
        LoopMode::Queue => "🔁",
    }
}

/// Embed de un aviso del motor de reproducción
pub fn notice_embed(notice: &Notice) -> CreateEmbed {
    match notice {
        Notice::NowPlaying { item, loop_mode } => create_now_playing_embed(item, *loop_mode),
        Notice::TrackFailed { title, reason } => create_error_embed(
            "⚠️ Canción omitida",
            &format!("No se pudo reproducir **{}**\n`{}`", title, reason),
        ),
        Notice::HydrationSummary {
            playlist,
            added,
            failed,
        } => {
            let mut embed = CreateEmbed::default()
                .title("📋 Playlist cargada")
                .description(format!("**{}**", playlist))
                .color(colors::MUSIC_PURPLE)
                .field("✅ Agregadas", added.to_string(), true);
            if *failed > 0 {
                embed = embed.field("⚠️ Omitidas", failed.to_string(), true);
            }
            embed
                .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
                .timestamp(Timestamp::now())
        }
    }
}

/// Crea un embed para mostrar la canción que empezó a sonar
pub fn create_now_playing_embed(item: &QueueItem, loop_mode: LoopMode) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**[{}]({})**", item.title, item.locator()))
        .color(colors::SUCCESS_GREEN)
        .field("⏱️ Duración", duration_label(item), true)
        .field("👤 Solicitado por", format!("<@{}>", item.requested_by), true)
        .field("🔁 Loop", loop_mode.label(), true);

    if let Some(thumbnail) = &item.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// `/nowplaying`: estado actual con barra de progreso
pub fn create_progress_embed(now: &NowPlaying) -> CreateEmbed {
    let status = match now.state {
        PlaybackState::Paused => "⏸️ En pausa",
        _ => "▶️ Reproduciendo",
    };

    let mut embed = CreateEmbed::default()
        .title(format!("{} {}", loop_icon(now.loop_mode), status))
        .description(format!(
            "**[{}]({})**\n\n{}",
            now.item.title,
            now.item.locator(),
            render_progress(now.elapsed, now.item.duration)
        ))
        .color(colors::MUSIC_PURPLE)
        .field("👤 Solicitado por", format!("<@{}>", now.item.requested_by), true)
        .field("🔊 Volumen", format!("{}%", (now.volume * 100.0).round() as u32), true)
        .field("📋 En cola", now.queued.to_string(), true);

    if let Some(thumbnail) = &now.item.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed.footer(CreateEmbedFooter::new(now.loop_mode.label()))
}

/// Crea un embed para mostrar que se agregó una canción
pub fn create_track_added_embed(item: &QueueItem, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("✅ Canción Agregada")
        .description(format!("**[{}]({})**", item.title, item.locator()))
        .color(colors::SUCCESS_GREEN)
        .field("⏱️ Duración", duration_label(item), true)
        .field("📍 Posición", format!("#{}", position), true)
        .field("👤 Solicitado por", format!("<@{}>", item.requested_by), true);

    if let Some(thumbnail) = &item.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new("🎵 Se reproducirá automáticamente cuando llegue su turno"))
}

/// Crea un embed para mostrar que una playlist empezó a cargarse
pub fn create_playlist_added_embed(
    title: &str,
    first: &QueueItem,
    pending: usize,
    skipped: usize,
) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Playlist Agregada")
        .description(format!("**{}**", title))
        .color(colors::MUSIC_PURPLE)
        .field("🎵 Primera canción", &first.title, false)
        .field("⏳ Cargando", format!("{} canciones", pending), true);

    if skipped > 0 {
        embed = embed.field("⚠️ Omitidas", skipped.to_string(), true);
    }

    embed
        .footer(CreateEmbedFooter::new(
            "🎵 El resto se agrega en segundo plano • Usa /queue para ver la cola",
        ))
        .timestamp(Timestamp::now())
}

/// Crea un embed para mostrar la cola de reproducción
pub fn create_queue_embed(current: Option<&NowPlaying>, page: &QueuePage) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if current.is_none() && page.total_items == 0 {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    if let Some(now) = current {
        embed = embed.field(
            format!("{} Reproduciendo", loop_icon(now.loop_mode)),
            format!(
                "**{}** `{}`\nSolicitado por <@{}>",
                now.item.title,
                duration_label(&now.item),
                now.item.requested_by
            ),
            false,
        );
    }

    if page.items.is_empty() {
        embed = embed.field("⏭️ Siguientes", "No hay más canciones en la cola", false);
    } else {
        let list = page
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                format!(
                    "`{}.` **{}** `{}` • <@{}> {}",
                    page.offset + i + 1,
                    item.title,
                    duration_label(item),
                    item.requested_by,
                    added_label(item)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        embed = embed.field("⏭️ Siguientes", list, false);
    }

    embed
        .footer(CreateEmbedFooter::new(format!(
            "Página {}/{} • {} canciones • {} en total",
            page.current_page,
            page.total_pages,
            page.total_items,
            format_duration(page.total_duration)
        )))
        .timestamp(Timestamp::now())
}

fn level_bar(stats: &UserStats) -> (String, u32) {
    let progress = stats.progress_to_next_level();
    let filled = ((progress * LEVEL_BAR_CELLS as f32) as usize).min(LEVEL_BAR_CELLS);
    let bar = format!("{}{}", "🟩".repeat(filled), "⬜".repeat(LEVEL_BAR_CELLS - filled));
    (bar, (progress * 100.0) as u32)
}

fn voice_time(stats: &UserStats) -> String {
    let hours = stats.total_time_secs / 3600;
    let minutes = (stats.total_time_secs % 3600) / 60;
    format!("{}h {}m", hours, minutes)
}

/// `/level`
pub fn create_level_embed(name: &str, avatar: &str, stats: &UserStats) -> CreateEmbed {
    let (bar, percent) = level_bar(stats);
    CreateEmbed::default()
        .title(format!("📊 Estadísticas de {}", name))
        .color(colors::LEVEL_GOLD)
        .thumbnail(avatar)
        .field("🆙 Nivel", stats.level.to_string(), true)
        .field("🎤 Tiempo en voz", voice_time(stats), true)
        .field("Progreso al siguiente nivel", format!("{} {}%", bar, percent), false)
}

/// `/profile`; un usuario sin registros se muestra en cero
pub fn create_profile_embed(name: &str, avatar: &str, stats: &UserStats) -> CreateEmbed {
    let (bar, percent) = level_bar(stats);
    CreateEmbed::default()
        .author(CreateEmbedAuthor::new(format!("Perfil de {}", name)).icon_url(avatar))
        .color(colors::PROFILE_PINK)
        .thumbnail(avatar)
        .field("🎤 Tiempo en voz", format!("**{}**", voice_time(stats)), true)
        .field("🎵 Canciones", format!("**{}**", stats.songs_played), true)
        .field("🆙 Nivel", format!("**{}**", stats.level), true)
        .field("✨ Progreso", format!("`[{}]` **{}%**", bar, percent), false)
        .footer(CreateEmbedFooter::new("XYZ Profile • Sube de nivel escuchando música"))
        .timestamp(Timestamp::now())
}

/// Crea el embed de ayuda general
pub fn create_help_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 XYZ Music - Ayuda")
        .description("Comandos disponibles")
        .color(colors::INFO_BLUE)
        .field(
            "📖 Cómo usar",
            "1. Entra a un canal de voz\n2. Usa `/play <canción>`\n3. Escucha y sube de nivel",
            false,
        )
        .field(
            "🎵 Música",
            "`/play` - Reproduce una canción o playlist\n\
            `/pause` / `/resume` - Pausa o reanuda\n\
            `/skip [posición]` - Salta la canción o va a una posición de la cola\n\
            `/stop` - Detiene y vacía la cola\n\
            `/queue [página]` - Muestra la cola\n\
            `/nowplaying` - Canción actual con progreso\n\
            `/loop [modo]` - Modo de repetición\n\
            `/volume [0-100]` - Ajusta el volumen\n\
            `/join` / `/leave` - Entra o sale del canal de voz",
            false,
        )
        .field(
            "📊 Niveles",
            "`/level [usuario]` - Nivel y tiempo en voz\n`/profile [usuario]` - Perfil completo",
            false,
        )
        .field(
            "⚙️ General",
            "`/ping` - Latencia\n\
            `/setname <nombre>` / `/resetname` - Cambia o restablece mi apodo\n\
            `/about` - Información del bot\n\
            `/help` - Esta ayuda",
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Información del bot (`/about`)
pub fn create_about_embed(bot_name: &str, guilds: usize, sessions: usize) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("👋 Hola, soy {}", bot_name))
        .description(env!("CARGO_PKG_DESCRIPTION"))
        .color(colors::LEVEL_GOLD)
        .field("📦 Versión", format!("`v{}`", env!("CARGO_PKG_VERSION")), true)
        .field("🌐 Servidores", guilds.to_string(), true)
        .field("🎵 Sesiones activas", sessions.to_string(), true)
        .field("🛠️ Hecho con", "Rust • Serenity • Songbird • yt-dlp", false)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Crea un embed de error estandarizado
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(title)
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
}

/// Crea un embed de éxito estandarizado
pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(title)
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
}

/// Crea un embed informativo estandarizado
pub fn create_info_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(title)
        .description(description)
        .color(colors::WARNING_ORANGE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stats(total_time_secs: u64) -> UserStats {
        UserStats {
            guild_id: 1,
            total_time_secs,
            level: UserStats::level_for(total_time_secs),
            songs_played: 0,
        }
    }

    #[test]
    fn level_bar_fills_proportionally() {
        let (bar, percent) = level_bar(&stats(3600 + 1800));
        assert_eq!(percent, 50);
        assert_eq!(bar.matches('🟩').count(), 5);
        assert_eq!(bar.matches('⬜').count(), 5);
    }

    #[test]
    fn queue_entries_show_when_they_were_added() {
        let mut item = QueueItem::new("https://youtu.be/a", "a", serenity::model::id::UserId::new(1));
        item.added_at = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        assert_eq!(added_label(&item), "<t:1700000000:R>");
    }

    #[test]
    fn voice_time_is_hours_and_minutes() {
        assert_eq!(voice_time(&stats(2 * 3600 + 15 * 60 + 59)), "2h 15m");
    }
}
