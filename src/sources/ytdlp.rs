use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::{sync::OnceLock, time::Duration};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{Resolution, ResolvedTrack, ShallowTrack, TrackResolver};
use crate::error::{PlaybackError, Result};

const MAX_CONCURRENT_PROCESSES: usize = 3;

/// Resolver basado en yt-dlp
pub struct YtDlpResolver {
    binary: String,
    timeout: Duration,
    // Limitar procesos concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

/// Información extraída de yt-dlp (`--dump-single-json`)
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    #[serde(rename = "_type")]
    kind: Option<String>,
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    original_url: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    is_live: Option<bool>,
    #[serde(default)]
    entries: Vec<YtDlpEntry>,
}

#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    original_url: Option<String>,
}

impl YtDlpEntry {
    fn locator(&self) -> Option<&str> {
        self.original_url
            .as_deref()
            .or(self.webpage_url.as_deref())
            .or(self.url.as_deref())
    }
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            rate_limiter: Semaphore::new(MAX_CONCURRENT_PROCESSES),
        }
    }

    pub fn is_url(query: &str) -> bool {
        static URL_RE: OnceLock<Regex> = OnceLock::new();
        let re = URL_RE.get_or_init(|| Regex::new(r"^https?://\S+$").expect("regex válida"));
        re.is_match(query.trim()) && url::Url::parse(query.trim()).is_ok()
    }

    /// Verifica que yt-dlp esté disponible (usado por `--health-check`)
    pub async fn verify(&self) -> anyhow::Result<String> {
        let output = Command::new(&self.binary).arg("--version").output().await?;
        if !output.status.success() {
            anyhow::bail!("{} no puede ejecutarse correctamente", self.binary);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn dump_json(&self, target: &str, flat: bool) -> Result<YtDlpInfo> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| PlaybackError::resolution(target, e))?;

        let mut args = vec![
            "--dump-single-json",
            "--no-warnings",
            "-f",
            "bestaudio/best",
        ];
        if flat {
            args.push("--flat-playlist");
        } else {
            args.push("--no-playlist");
        }
        args.push(target);

        debug!("📊 yt-dlp {:?}", args);
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.binary).args(&args).output(),
        )
        .await
        .map_err(|_| PlaybackError::resolution(target, "tiempo de espera agotado"))?
        .map_err(|e| PlaybackError::resolution(target, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PlaybackError::resolution(target, stderr.trim()));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| PlaybackError::resolution(target, e))
    }

    async fn resolve_single(&self, locator: &str) -> Result<ResolvedTrack> {
        let info = self.dump_json(locator, false).await?;
        into_resolved(info, locator)
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<Resolution> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PlaybackError::NoResults(String::new()));
        }

        if !Self::is_url(query) {
            info!("🔍 Buscando en YouTube: {}", query);
            let search = self.dump_json(&format!("ytsearch1:{}", query), true).await?;
            let first = search
                .entries
                .iter()
                .find_map(|e| e.locator())
                .ok_or_else(|| PlaybackError::NoResults(query.to_string()))?
                .to_string();
            return self.resolve_single(&first).await.map(Resolution::Track);
        }

        let info = self.dump_json(query, true).await?;
        if info.kind.as_deref() == Some("playlist") {
            let title = info.title.clone().unwrap_or_else(|| "Playlist".to_string());
            let entries = shallow_entries(info);
            info!("📋 Playlist '{}' con {} canciones", title, entries.len());
            if entries.is_empty() {
                return Err(PlaybackError::NoResults(query.to_string()));
            }
            return Ok(Resolution::Playlist { title, entries });
        }

        // Un flat dump de un video no siempre trae la URL de stream
        match into_resolved(info, query) {
            Ok(track) => Ok(Resolution::Track(track)),
            Err(e) => {
                warn!("⚠️ Dump plano incompleto, resolviendo de nuevo: {}", e);
                self.resolve_single(query).await.map(Resolution::Track)
            }
        }
    }
}

fn shallow_entries(info: YtDlpInfo) -> Vec<ShallowTrack> {
    info.entries
        .into_iter()
        .filter_map(|entry| {
            let locator = entry.locator()?.to_string();
            Some(ShallowTrack {
                title: entry.title.unwrap_or_else(|| locator.clone()),
                locator,
            })
        })
        .collect()
}

fn into_resolved(info: YtDlpInfo, requested: &str) -> Result<ResolvedTrack> {
    let stream_url = info
        .url
        .clone()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| PlaybackError::resolution(requested, "sin URL de stream"))?;

    let locator = info
        .original_url
        .or(info.webpage_url)
        .unwrap_or_else(|| requested.to_string());

    let duration = match info.is_live {
        Some(true) => None,
        _ => info
            .duration
            .filter(|d| *d > 0.0)
            .map(Duration::from_secs_f64),
    };

    Ok(ResolvedTrack {
        title: info.title.unwrap_or_else(|| "Título desconocido".to_string()),
        locator,
        stream_url,
        duration,
        thumbnail: info.thumbnail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(json: &str) -> YtDlpInfo {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_url_detection() {
        assert!(YtDlpResolver::is_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(YtDlpResolver::is_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(!YtDlpResolver::is_url("never gonna give you up"));
        assert!(!YtDlpResolver::is_url("https://example.com/a b"));
    }

    #[test]
    fn single_video_keeps_stable_locator() {
        let info = parse(
            r#"{
                "title": "Song",
                "url": "https://rr3.googlevideo.com/videoplayback?x=1",
                "webpage_url": "https://www.youtube.com/watch?v=abc",
                "duration": 212.0,
                "thumbnail": "https://i.ytimg.com/vi/abc/hq.jpg"
            }"#,
        );
        let track = into_resolved(info, "https://youtu.be/abc").unwrap();
        assert_eq!(track.locator, "https://www.youtube.com/watch?v=abc");
        assert_eq!(track.stream_url, "https://rr3.googlevideo.com/videoplayback?x=1");
        assert_eq!(track.duration, Some(Duration::from_secs(212)));
    }

    #[test]
    fn live_stream_has_no_duration() {
        let info = parse(r#"{"title": "Radio", "url": "https://s/x", "is_live": true, "duration": 10.0}"#);
        let track = into_resolved(info, "https://youtu.be/live").unwrap();
        assert!(track.is_live());
        assert_eq!(track.locator, "https://youtu.be/live");
    }

    #[test]
    fn missing_stream_url_is_a_resolution_failure() {
        let info = parse(r#"{"title": "Flat"}"#);
        let err = into_resolved(info, "https://youtu.be/flat").unwrap_err();
        assert!(matches!(err, PlaybackError::Resolution { .. }));
    }

    #[test]
    fn playlist_entries_prefer_original_url() {
        let info = parse(
            r#"{
                "_type": "playlist",
                "title": "Mix",
                "entries": [
                    {"title": "A", "url": "abc", "original_url": "https://www.youtube.com/watch?v=abc"},
                    {"title": "B", "url": "https://www.youtube.com/watch?v=def"},
                    {"title": "sin locator"}
                ]
            }"#,
        );
        let entries = shallow_entries(info);
        assert_eq!(
            entries,
            vec![
                ShallowTrack {
                    locator: "https://www.youtube.com/watch?v=abc".into(),
                    title: "A".into()
                },
                ShallowTrack {
                    locator: "https://www.youtube.com/watch?v=def".into(),
                    title: "B".into()
                },
            ]
        );
    }
}
