use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::audio::player::PlayerSettings;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub default_volume: f32,
    pub max_queue_size: usize,
    pub max_playlist_size: usize,
    pub queue_page_size: usize,

    // Resolución
    pub resolve_timeout_secs: u64,
    pub stream_cache_ttl_secs: u64, // 0 desactiva el cache
    pub ytdlp_path: String,

    // Paths
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Create directories if they don't exist
        std::fs::create_dir_all(&config.data_dir)?;

        config.validate()?;

        Ok(config)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let parsed = |key: &str, default: String| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default)
        };

        Ok(Self {
            // Discord
            discord_token: lookup("DISCORD_TOKEN").context("DISCORD_TOKEN no está definido")?,
            application_id: lookup("APPLICATION_ID")
                .context("APPLICATION_ID no está definido")?
                .parse()
                .context("APPLICATION_ID inválido")?,
            guild_id: lookup("GUILD_ID").and_then(|s| s.parse().ok()),

            // Audio
            default_volume: parsed("DEFAULT_VOLUME", defaults.default_volume.to_string())
                .parse()
                .context("DEFAULT_VOLUME inválido")?,
            max_queue_size: parsed("MAX_QUEUE_SIZE", defaults.max_queue_size.to_string())
                .parse()
                .context("MAX_QUEUE_SIZE inválido")?,
            max_playlist_size: parsed("MAX_PLAYLIST_SIZE", defaults.max_playlist_size.to_string())
                .parse()
                .context("MAX_PLAYLIST_SIZE inválido")?,
            queue_page_size: parsed("QUEUE_PAGE_SIZE", defaults.queue_page_size.to_string())
                .parse()
                .context("QUEUE_PAGE_SIZE inválido")?,

            // Resolución
            resolve_timeout_secs: parsed(
                "RESOLVE_TIMEOUT_SECS",
                defaults.resolve_timeout_secs.to_string(),
            )
            .parse()
            .context("RESOLVE_TIMEOUT_SECS inválido")?,
            stream_cache_ttl_secs: parsed(
                "STREAM_CACHE_TTL_SECS",
                defaults.stream_cache_ttl_secs.to_string(),
            )
            .parse()
            .context("STREAM_CACHE_TTL_SECS inválido")?,
            ytdlp_path: parsed("YTDLP_PATH", defaults.ytdlp_path),

            // Paths
            data_dir: parsed("DATA_DIR", defaults.data_dir.display().to_string()).into(),
        })
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 0.0 and 1.0
    /// - Queue, playlist and page sizes must be greater than 0
    /// - The resolve timeout must be greater than 0
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!("Default volume must be between 0.0 and 1.0, got: {}", self.default_volume);
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        if self.queue_page_size == 0 {
            anyhow::bail!("Queue page size must be greater than 0");
        }

        if self.resolve_timeout_secs == 0 {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        Ok(())
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn player_settings(&self) -> PlayerSettings {
        PlayerSettings {
            max_queue_size: self.max_queue_size,
            max_playlist_size: self.max_playlist_size,
            queue_page_size: self.queue_page_size,
            default_volume: self.default_volume,
            stream_cache_ttl: Duration::from_secs(self.stream_cache_ttl_secs),
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes the bot token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Audio: {}% vol, {} queue, {} playlist, {}/page\n  \
            Resolver: {} ({}s timeout, {}s stream cache)\n  \
            Data: {}",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0) as u32,
            self.max_queue_size,
            self.max_playlist_size,
            self.queue_page_size,
            self.ytdlp_path,
            self.resolve_timeout_secs,
            self.stream_cache_ttl_secs,
            self.data_dir.display(),
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            // Audio defaults
            default_volume: 0.5,
            max_queue_size: 1000,
            max_playlist_size: 100,
            queue_page_size: 10,

            // Resolver defaults
            resolve_timeout_secs: 60,
            stream_cache_ttl_secs: 600,
            ytdlp_path: "yt-dlp".to_string(),

            // Path defaults
            data_dir: "./data".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [("DISCORD_TOKEN", "token"), ("APPLICATION_ID", "1234")];

    #[test]
    fn missing_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.application_id, 1234);
        assert_eq!(config.guild_id, None);
        assert_eq!(config.default_volume, 0.5);
        assert_eq!(config.max_queue_size, 1000);
        assert_eq!(config.queue_page_size, 10);
        assert_eq!(config.stream_cache_ttl_secs, 600);
        assert_eq!(config.ytdlp_path, "yt-dlp");
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn environment_overrides_defaults() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("GUILD_ID", "99"),
            ("DEFAULT_VOLUME", "0.8"),
            ("STREAM_CACHE_TTL_SECS", "0"),
            ("YTDLP_PATH", "/usr/local/bin/yt-dlp"),
        ]);
        let config = Config::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(config.guild_id, Some(99));
        assert_eq!(config.default_volume, 0.8);
        assert_eq!(config.player_settings().stream_cache_ttl, Duration::ZERO);
        assert_eq!(config.ytdlp_path, "/usr/local/bin/yt-dlp");
    }

    #[test]
    fn token_is_required() {
        let err = Config::from_lookup(lookup(&[("APPLICATION_ID", "1")])).unwrap_err();
        assert!(err.to_string().contains("DISCORD_TOKEN"));
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let loud = Config {
            default_volume: 1.5,
            ..Config::default()
        };
        assert!(loud.validate().is_err());

        let no_pages = Config {
            queue_page_size: 0,
            ..Config::default()
        };
        assert!(no_pages.validate().is_err());

        let no_timeout = Config {
            resolve_timeout_secs: 0,
            ..Config::default()
        };
        assert!(no_timeout.validate().is_err());
    }

    #[test]
    fn summary_hides_the_token() {
        let config = Config {
            discord_token: "super-secret".to_string(),
            ..Config::default()
        };
        assert!(!config.summary().contains("super-secret"));
    }
}
