use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId, permissions::Permissions},
    prelude::Context,
};

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        pause_command(),
        resume_command(),
        skip_command(),
        stop_command(),
        queue_command(),
        nowplaying_command(),
        loop_command(),
        volume_command(),
        join_command(),
        leave_command(),
        level_command(),
        profile_command(),
        ping_command(),
        setname_command(),
        resetname_command(),
        about_command(),
        help_command(),
    ]
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce una canción o playlist")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL o término de búsqueda",
            )
            .required(true),
        )
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa la reproducción actual")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Reanuda la reproducción")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip")
        .description("Salta la canción actual o salta a una posición de la cola")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "position",
                "Posición de la cola a reproducir",
            )
            .required(false)
            .min_int_value(1),
        )
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la reproducción y limpia la cola")
}

// Comandos de cola

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue")
        .description("Muestra la cola de reproducción")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "page", "Número de página")
                .required(false)
                .min_int_value(1),
        )
}

fn nowplaying_command() -> CreateCommand {
    CreateCommand::new("nowplaying").description("Muestra la canción actual y su progreso")
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop")
        .description("Configura el modo de repetición")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "mode", "Modo de repetición")
                .required(false)
                .add_string_choice("Desactivado", "off")
                .add_string_choice("Canción", "track")
                .add_string_choice("Cola", "queue"),
        )
}

// Comandos de audio

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Ajusta o muestra el volumen")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "level", "Volumen (0-100)")
                .required(false)
                .min_int_value(0)
                .max_int_value(100),
        )
}

// Comandos de conexión

fn join_command() -> CreateCommand {
    CreateCommand::new("join").description("Une el bot a tu canal de voz")
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Desconecta el bot del canal de voz")
}

// Comandos de perfil

fn level_command() -> CreateCommand {
    CreateCommand::new("level")
        .description("Muestra el nivel de un usuario")
        .add_option(
            CreateCommandOption::new(CommandOptionType::User, "user", "Usuario a consultar")
                .required(false),
        )
}

fn profile_command() -> CreateCommand {
    CreateCommand::new("profile")
        .description("Muestra el perfil musical de un usuario")
        .add_option(
            CreateCommandOption::new(CommandOptionType::User, "user", "Usuario a consultar")
                .required(false),
        )
}

// Utilidades

fn ping_command() -> CreateCommand {
    CreateCommand::new("ping").description("Mide la latencia del bot")
}

fn setname_command() -> CreateCommand {
    CreateCommand::new("setname")
        .description("Cambia mi apodo en este servidor")
        .default_member_permissions(Permissions::MANAGE_NICKNAMES)
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "name", "Nuevo apodo")
                .required(true)
                .min_length(1)
                .max_length(32),
        )
}

fn resetname_command() -> CreateCommand {
    CreateCommand::new("resetname")
        .description("Restablece mi apodo al nombre de usuario")
        .default_member_permissions(Permissions::MANAGE_NICKNAMES)
}

fn about_command() -> CreateCommand {
    CreateCommand::new("about").description("Información sobre el bot")
}

fn help_command() -> CreateCommand {
    CreateCommand::new("help").description("Muestra la ayuda del bot")
}
