use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, model::id::ApplicationId, Client};
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod cache;
mod config;
mod error;
mod sources;
mod storage;
mod ui;

use crate::audio::player::AudioPlayer;
use crate::bot::{notifier::DiscordNotifier, MusicBot};
use crate::config::Config;
use crate::sources::ytdlp::YtDlpResolver;
use crate::storage::LevelingStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("xyz_music=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando XYZ Music v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    let resolver = Arc::new(YtDlpResolver::new(
        config.ytdlp_path.clone(),
        config.resolve_timeout(),
    ));

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&resolver).await;
    }

    // Niveles y estadísticas
    let store = Arc::new(LevelingStore::new(config.data_dir.clone()).await?);

    let http = Arc::new(Http::new(&config.discord_token));
    let notifier = Arc::new(DiscordNotifier::new(http));

    let player = AudioPlayer::new(
        config.player_settings(),
        resolver.clone(),
        store.clone(),
        notifier.clone(),
    );

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let token = config.discord_token.clone();
    let application_id = ApplicationId::new(config.application_id);
    let shutdown_player = player.clone();
    let handler = MusicBot::new(config, player, store, notifier, resolver);

    // Construir cliente
    let mut client = Client::builder(&token, intents)
        .application_id(application_id)
        .event_handler(handler)
        .register_songbird()
        .await?;

    // Manejar shutdown graceful
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!(
            "⚠️ Señal de shutdown recibida, cerrando {} sesiones...",
            shutdown_player.active_sessions()
        );
        for guild_id in shutdown_player.guilds() {
            if let Err(e) = shutdown_player.teardown(guild_id).await {
                error!("Error al cerrar la sesión de guild {}: {:?}", guild_id, e);
            }
        }
        std::process::exit(0);
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check(resolver: &YtDlpResolver) -> Result<()> {
    let version = resolver.verify().await?;
    info!("✅ yt-dlp {}", version);
    println!("OK");
    Ok(())
}
