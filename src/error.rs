//! Error types for the playback engine.
//!
//! Per-track failures (`Resolution`, `Transport`) are contained inside the
//! session's advance loop; user-facing failures (`InvalidIndex`,
//! `NotConnected`, `NothingPlaying`) are returned to the invoking command and
//! never change session state.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// El locator no pudo convertirse en un stream reproducible
    #[error("No se pudo resolver `{locator}`: {reason}")]
    Resolution { locator: String, reason: String },

    /// Error de reproducción a nivel de plataforma
    #[error("Error de transporte de audio: {0}")]
    Transport(String),

    /// Posición de la cola fuera de rango (1-based)
    #[error("La posición {index} no existe (la cola tiene {len} canciones)")]
    InvalidIndex { index: usize, len: usize },

    #[error("No hay una sesión de voz activa en este servidor")]
    NotConnected,

    #[error("La cola está vacía")]
    EmptyQueue,

    #[error("No hay nada reproduciéndose")]
    NothingPlaying,

    #[error("La cola está llena (máximo {0} canciones)")]
    QueueFull(usize),

    #[error("No se encontraron resultados para `{0}`")]
    NoResults(String),
}

impl PlaybackError {
    pub fn resolution(locator: impl Into<String>, reason: impl ToString) -> Self {
        Self::Resolution {
            locator: locator.into(),
            reason: reason.to_string(),
        }
    }

    /// Errores que afectan solo a una canción y no a la sesión
    pub fn is_per_track(&self) -> bool {
        matches!(self, Self::Resolution { .. } | Self::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_track_errors_are_classified() {
        assert!(PlaybackError::resolution("https://youtu.be/x", "timeout").is_per_track());
        assert!(PlaybackError::Transport("driver".into()).is_per_track());
        assert!(!PlaybackError::InvalidIndex { index: 4, len: 2 }.is_per_track());
        assert!(!PlaybackError::NotConnected.is_per_track());
    }

    #[test]
    fn invalid_index_message_names_both_numbers() {
        let msg = PlaybackError::InvalidIndex { index: 9, len: 3 }.to_string();
        assert!(msg.contains('9'));
        assert!(msg.contains('3'));
    }
}
