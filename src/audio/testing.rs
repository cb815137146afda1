//! In-memory stand-ins for the voice transport and the notification surface,
//! used by the engine tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, MessageId};
use std::{
    collections::HashSet,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::Duration,
};

use super::{
    notice::{Notice, NoticeHandle, Notifier},
    transport::{CompletionHook, TransportSink},
};
use crate::error::{PlaybackError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Play(String),
    Pause,
    Resume,
    Stop,
    Volume(f32),
    Disconnect,
}

/// Transporte que registra cada llamada.
///
/// Igual que Songbird, detener o reemplazar una canción dispara su aviso de fin.
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
    active: Mutex<Option<CompletionHook>>,
    rejected: Mutex<HashSet<String>>,
    hung_up: AtomicBool,
}

impl RecordingTransport {
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().clone()
    }

    pub fn plays(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                TransportCall::Play(url) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    /// `play` fallará para esta URL
    pub fn reject(&self, stream_url: &str) {
        self.rejected.lock().insert(stream_url.to_string());
    }

    /// La llamada de voz se cayó: todo `play` devuelve `NotConnected`
    pub fn hang_up(&self) {
        self.hung_up.store(true, Ordering::SeqCst);
    }

    /// Simula el fin natural de la canción en curso
    pub fn finish_current(&self) {
        if let Some(hook) = self.active.lock().take() {
            hook.fire();
        }
    }

    /// Simula un stream que se corta a mitad de la canción
    pub fn fail_current(&self, reason: &str) {
        if let Some(hook) = self.active.lock().take() {
            hook.fail(reason);
        }
    }

    fn record(&self, call: TransportCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl TransportSink for RecordingTransport {
    async fn play(&self, stream_url: &str, volume: f32, on_complete: CompletionHook) -> Result<()> {
        self.record(TransportCall::Play(stream_url.to_string()));
        if self.hung_up.load(Ordering::SeqCst) {
            return Err(PlaybackError::NotConnected);
        }
        if self.rejected.lock().contains(stream_url) {
            return Err(PlaybackError::Transport(format!("rechazado: {stream_url}")));
        }
        self.record(TransportCall::Volume(volume));
        if let Some(replaced) = self.active.lock().replace(on_complete) {
            replaced.fire();
        }
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record(TransportCall::Pause);
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.record(TransportCall::Resume);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.record(TransportCall::Stop);
        self.finish_current();
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        self.record(TransportCall::Volume(volume));
        Ok(())
    }

    async fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    async fn disconnect(&self) -> Result<()> {
        self.record(TransportCall::Disconnect);
        Ok(())
    }
}

/// Notificador que guarda lo enviado y lo borrado
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(NoticeHandle, Notice)>>,
    deleted: Mutex<Vec<NoticeHandle>>,
    next_id: AtomicU64,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.sent.lock().iter().map(|(_, n)| n.clone()).collect()
    }

    pub fn handles(&self) -> Vec<NoticeHandle> {
        self.sent.lock().iter().map(|(h, _)| *h).collect()
    }

    pub fn deleted(&self) -> Vec<NoticeHandle> {
        self.deleted.lock().clone()
    }

    pub fn failures(&self) -> Vec<String> {
        self.notices()
            .into_iter()
            .filter_map(|n| match n {
                Notice::TrackFailed { title, .. } => Some(title),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, _guild_id: GuildId, notice: Notice) -> anyhow::Result<NoticeHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = NoticeHandle {
            channel_id: ChannelId::new(1),
            message_id: MessageId::new(id),
        };
        self.sent.lock().push((handle, notice));
        Ok(handle)
    }

    async fn delete(&self, handle: NoticeHandle) {
        self.deleted.lock().push(handle);
    }
}

/// Espera hasta que `check` se cumpla; falla el test a los 2 segundos
pub async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        if tokio::time::Instant::now() > deadline {
            panic!("timeout esperando: {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
