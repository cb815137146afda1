//! # Sources Module
//!
//! Resolution of user queries (links or free text) into playable tracks.
//!
//! A [`TrackResolver`] turns a locator into either one fully resolved track
//! (stream URL plus metadata) or a list of shallow playlist entries that can
//! be queued immediately and resolved later by the hydration task.
//!
//! Resolution is network-bound and slow; callers always invoke it outside
//! the session lock.

pub mod ytdlp;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{PlaybackError, Result};

pub use ytdlp::YtDlpResolver;

/// Resolución de un locator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Resuelve una URL o un término de búsqueda
    async fn resolve(&self, query: &str) -> Result<Resolution>;
}

/// Resultado de resolver un locator
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Track(ResolvedTrack),
    Playlist {
        title: String,
        entries: Vec<ShallowTrack>,
    },
}

/// Track completamente resuelto, listo para el transporte
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTrack {
    /// Identificador estable, re-resoluble
    pub locator: String,
    /// URL directa de audio; expira
    pub stream_url: String,
    pub title: String,
    pub duration: Option<Duration>,
    pub thumbnail: Option<String>,
}

/// Entrada de playlist sin resolver
#[derive(Debug, Clone, PartialEq)]
pub struct ShallowTrack {
    pub locator: String,
    pub title: String,
}

impl ResolvedTrack {
    pub fn is_live(&self) -> bool {
        self.duration.is_none()
    }
}

/// Resuelve un locator que debe ser una sola canción
pub async fn resolve_track(resolver: &dyn TrackResolver, locator: &str) -> Result<ResolvedTrack> {
    match resolver.resolve(locator).await? {
        Resolution::Track(track) => Ok(track),
        Resolution::Playlist { .. } => Err(PlaybackError::resolution(
            locator,
            "se esperaba una canción y llegó una playlist",
        )),
    }
}
