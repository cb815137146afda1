use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serenity::model::id::{GuildId, UserId};
use std::{collections::HashMap, path::PathBuf};
use tokio::{fs, sync::Mutex};
use tracing::{debug, info, warn};

const STATS_FILE: &str = "user_stats.json";
const SECONDS_PER_LEVEL: u64 = 3600;
const MAX_LEVEL: u32 = 100;

/// Colaborador de estadísticas usado por el motor de reproducción
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatsRecorder: Send + Sync {
    /// Suma una canción reproducida al usuario que la pidió
    async fn record_play(&self, user_id: UserId, guild_id: GuildId) -> Result<()>;
}

/// Estadísticas de un usuario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub guild_id: u64,
    pub total_time_secs: u64,
    pub level: u32,
    pub songs_played: u64,
}

impl UserStats {
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id: guild_id.get(),
            total_time_secs: 0,
            level: 1,
            songs_played: 0,
        }
    }

    /// Nivel = 1 + horas en voz, con tope
    pub fn level_for(total_time_secs: u64) -> u32 {
        let level = 1 + total_time_secs / SECONDS_PER_LEVEL;
        level.min(MAX_LEVEL as u64) as u32
    }

    /// Fracción [0, 1) hacia el siguiente nivel
    pub fn progress_to_next_level(&self) -> f32 {
        (self.total_time_secs % SECONDS_PER_LEVEL) as f32 / SECONDS_PER_LEVEL as f32
    }
}

/// Almacenamiento de niveles basado en un archivo JSON
pub struct LevelingStore {
    path: PathBuf,
    users: Mutex<HashMap<u64, UserStats>>,
}

impl LevelingStore {
    pub async fn new(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&data_dir).await?;
        let path = data_dir.join(STATS_FILE);

        let users = match fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Archivo de estadísticas corrupto, empezando de cero: {}", e);
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!("📁 Estadísticas cargadas: {} usuarios ({})", users.len(), path.display());

        Ok(Self {
            path,
            users: Mutex::new(users),
        })
    }

    pub async fn stats(&self, user_id: UserId) -> Option<UserStats> {
        self.users.lock().await.get(&user_id.get()).cloned()
    }

    /// Suma tiempo en canales de voz y recalcula el nivel
    pub async fn add_voice_time(&self, user_id: UserId, guild_id: GuildId, secs: u64) -> Result<UserStats> {
        let mut users = self.users.lock().await;
        let stats = users
            .entry(user_id.get())
            .or_insert_with(|| UserStats::new(guild_id));
        stats.total_time_secs += secs;
        stats.level = UserStats::level_for(stats.total_time_secs);
        let updated = stats.clone();

        self.persist(&users).await?;
        debug!("🎤 {} +{}s en voz (nivel {})", user_id, secs, updated.level);
        Ok(updated)
    }

    pub async fn increment_songs_played(&self, user_id: UserId, guild_id: GuildId) -> Result<UserStats> {
        let mut users = self.users.lock().await;
        let stats = users
            .entry(user_id.get())
            .or_insert_with(|| UserStats::new(guild_id));
        stats.songs_played += 1;
        let updated = stats.clone();

        self.persist(&users).await?;
        Ok(updated)
    }

    async fn persist(&self, users: &HashMap<u64, UserStats>) -> Result<()> {
        let content = serde_json::to_string_pretty(users)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl StatsRecorder for LevelingStore {
    async fn record_play(&self, user_id: UserId, guild_id: GuildId) -> Result<()> {
        self.increment_songs_played(user_id, guild_id).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn level_grows_one_per_hour_and_caps() {
        assert_eq!(UserStats::level_for(0), 1);
        assert_eq!(UserStats::level_for(3599), 1);
        assert_eq!(UserStats::level_for(3600), 2);
        assert_eq!(UserStats::level_for(1_000 * 3600), 100);
    }

    #[tokio::test]
    async fn record_play_creates_user_at_level_one() {
        let dir = tempfile::tempdir().unwrap();
        let store = LevelingStore::new(dir.path().to_path_buf()).await.unwrap();
        let user = UserId::new(42);

        store.record_play(user, GuildId::new(1)).await.unwrap();
        store.record_play(user, GuildId::new(1)).await.unwrap();

        let stats = store.stats(user).await.unwrap();
        assert_eq!(stats.songs_played, 2);
        assert_eq!(stats.level, 1);
        assert_eq!(stats.guild_id, 1);
    }

    #[tokio::test]
    async fn voice_time_updates_level_and_progress() {
        let dir = tempfile::tempdir().unwrap();
        let store = LevelingStore::new(dir.path().to_path_buf()).await.unwrap();
        let user = UserId::new(5);

        store.add_voice_time(user, GuildId::new(1), 3000).await.unwrap();
        let stats = store.add_voice_time(user, GuildId::new(1), 1500).await.unwrap();

        assert_eq!(stats.total_time_secs, 4500);
        assert_eq!(stats.level, 2);
        assert!((stats.progress_to_next_level() - 0.25).abs() < 1e-6);
    }

    #[tokio::test]
    async fn stats_survive_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let user = UserId::new(9);
        {
            let store = LevelingStore::new(dir.path().to_path_buf()).await.unwrap();
            store.record_play(user, GuildId::new(3)).await.unwrap();
            store.add_voice_time(user, GuildId::new(3), 7200).await.unwrap();
        }

        let reloaded = LevelingStore::new(dir.path().to_path_buf()).await.unwrap();
        let stats = reloaded.stats(user).await.unwrap();
        assert_eq!(stats.songs_played, 1);
        assert_eq!(stats.level, 3);
    }
}
