use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use songbird::{
    input::{HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use super::registry::SessionEvent;
use crate::error::{PlaybackError, Result};

/// Aviso de fin de canción, marcado con el token de la reproducción
#[derive(Debug, Clone)]
pub struct CompletionHook {
    token: u64,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl CompletionHook {
    pub(crate) fn new(token: u64, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { token, events }
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    /// Entrega el fin de canción al worker de la sesión
    pub fn fire(&self) {
        if self
            .events
            .send(SessionEvent::TrackEnded { token: self.token })
            .is_err()
        {
            debug!("Sesión cerrada, fin de canción {} descartado", self.token);
        }
    }

    /// El transporte no pudo seguir reproduciendo: la canción no terminó
    pub fn fail(&self, reason: impl Into<String>) {
        let event = SessionEvent::TrackFailed {
            token: self.token,
            reason: reason.into(),
        };
        if self.events.send(event).is_err() {
            debug!("Sesión cerrada, error de canción {} descartado", self.token);
        }
    }
}

/// Salida de audio de una sesión. Solo la sesión dueña la controla.
#[async_trait]
pub trait TransportSink: Send + Sync {
    async fn play(&self, stream_url: &str, volume: f32, on_complete: CompletionHook) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn resume(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn set_volume(&self, volume: f32) -> Result<()>;

    async fn is_active(&self) -> bool;

    async fn disconnect(&self) -> Result<()>;
}

/// Transporte sobre una llamada de voz de Songbird
pub struct SongbirdTransport {
    call: Arc<Mutex<Call>>,
    http: reqwest::Client,
    current: SyncMutex<Option<TrackHandle>>,
}

impl SongbirdTransport {
    pub fn new(call: Arc<Mutex<Call>>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PlaybackError::Transport(e.to_string()))?;

        Ok(Self {
            call,
            http,
            current: SyncMutex::new(None),
        })
    }

    fn track(&self) -> Option<TrackHandle> {
        self.current.lock().clone()
    }
}

fn transport_err(e: impl std::fmt::Display) -> PlaybackError {
    PlaybackError::Transport(e.to_string())
}

#[async_trait]
impl TransportSink for SongbirdTransport {
    async fn play(&self, stream_url: &str, volume: f32, on_complete: CompletionHook) -> Result<()> {
        let input: Input = HttpRequest::new(self.http.clone(), stream_url.to_string()).into();

        let handle = {
            let mut call = self.call.lock().await;
            if call.current_channel().is_none() {
                return Err(PlaybackError::NotConnected);
            }
            call.stop();
            call.play_input(input)
        };

        handle.set_volume(volume).map_err(transport_err)?;
        handle
            .add_event(Event::Track(TrackEvent::End), TrackEndNotifier(on_complete.clone()))
            .map_err(transport_err)?;
        handle
            .add_event(Event::Track(TrackEvent::Error), TrackErrorNotifier(on_complete))
            .map_err(transport_err)?;

        *self.current.lock() = Some(handle);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        match self.track() {
            Some(track) => track.pause().map_err(transport_err),
            None => Err(PlaybackError::NothingPlaying),
        }
    }

    async fn resume(&self) -> Result<()> {
        match self.track() {
            Some(track) => track.play().map_err(transport_err),
            None => Err(PlaybackError::NothingPlaying),
        }
    }

    async fn stop(&self) -> Result<()> {
        if let Some(track) = self.current.lock().take() {
            // El track puede haber terminado ya
            let _ = track.stop();
        }
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        match self.track() {
            Some(track) => track.set_volume(volume).map_err(transport_err),
            None => Ok(()),
        }
    }

    async fn is_active(&self) -> bool {
        let Some(track) = self.track() else {
            return false;
        };
        match track.get_info().await {
            Ok(info) => matches!(info.playing, PlayMode::Play | PlayMode::Pause),
            Err(_) => false,
        }
    }

    async fn disconnect(&self) -> Result<()> {
        self.stop().await?;
        let mut call = self.call.lock().await;
        call.leave().await.map_err(transport_err)
    }
}

/// Handler de Songbird para el fin natural de un track
struct TrackEndNotifier(CompletionHook);

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        self.0.fire();
        None
    }
}

/// Handler de Songbird para tracks que fallan durante la reproducción
struct TrackErrorNotifier(CompletionHook);

#[async_trait]
impl VoiceEventHandler for TrackErrorNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let mut reason = String::from("error de reproducción");
        if let EventContext::Track(tracks) = ctx {
            for (state, _handle) in *tracks {
                if let PlayMode::Errored(e) = &state.playing {
                    warn!("❌ Error en track (token {}): {:?}", self.0.token(), e);
                    reason = format!("{e:?}");
                }
            }
        }

        self.0.fail(reason);
        None
    }
}
