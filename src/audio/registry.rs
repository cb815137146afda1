use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info};

use super::session::PlaybackSession;

/// Mensajes al worker de una sesión; el worker es el único que ejecuta `advance()`
#[derive(Debug)]
pub enum SessionEvent {
    /// El transporte terminó la reproducción con este token
    TrackEnded { token: u64 },
    /// El transporte abortó la reproducción con este token
    TrackFailed { token: u64, reason: String },
    /// Empezar a reproducir si la sesión está Idle
    Start { done: Option<oneshot::Sender<()>> },
    /// Skip pedido por un usuario; válido mientras el epoch siga siendo `token`
    Skip {
        token: u64,
        done: Option<oneshot::Sender<()>>,
    },
}

/// Acceso compartido a una sesión registrada
#[derive(Clone)]
pub struct SessionHandle {
    /// Distingue una sesión de otra creada después para el mismo servidor
    pub generation: u64,
    pub state: Arc<Mutex<PlaybackSession>>,
    pub events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    pub fn post(&self, event: SessionEvent) -> bool {
        self.events.send(event).is_ok()
    }
}

/// Registro de sesiones por servidor
pub struct SessionRegistry {
    sessions: DashMap<GuildId, SessionHandle>,
    next_generation: AtomicU64,
    max_queue_size: usize,
    default_volume: f32,
}

impl SessionRegistry {
    pub fn new(max_queue_size: usize, default_volume: f32) -> Self {
        Self {
            sessions: DashMap::new(),
            next_generation: AtomicU64::new(1),
            max_queue_size,
            default_volume,
        }
    }

    pub fn get(&self, guild_id: GuildId) -> Option<SessionHandle> {
        self.sessions.get(&guild_id).map(|h| h.clone())
    }

    /// ¿Sigue registrada exactamente esta sesión?
    pub fn is_live(&self, guild_id: GuildId, generation: u64) -> bool {
        self.sessions
            .get(&guild_id)
            .is_some_and(|h| h.generation == generation)
    }

    /// Devuelve la sesión existente o crea una nueva.
    ///
    /// El receptor solo se devuelve cuando la sesión es nueva; quien lo recibe
    /// debe lanzar el worker.
    pub fn get_or_create(
        &self,
        guild_id: GuildId,
    ) -> (SessionHandle, Option<mpsc::UnboundedReceiver<SessionEvent>>) {
        let mut receiver = None;
        let handle = self
            .sessions
            .entry(guild_id)
            .or_insert_with(|| {
                let (tx, rx) = mpsc::unbounded_channel();
                receiver = Some(rx);
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                info!("🆕 Sesión {} creada para guild {}", generation, guild_id);
                SessionHandle {
                    generation,
                    state: Arc::new(Mutex::new(PlaybackSession::new(
                        self.max_queue_size,
                        self.default_volume,
                    ))),
                    events: tx,
                }
            })
            .clone();

        (handle, receiver)
    }

    /// Quita la sesión del registro; idempotente
    pub fn remove(&self, guild_id: GuildId) -> Option<SessionHandle> {
        let removed = self.sessions.remove(&guild_id).map(|(_, h)| h);
        if removed.is_none() {
            debug!("Guild {} no tenía sesión", guild_id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn guilds(&self) -> Vec<GuildId> {
        self.sessions.iter().map(|e| *e.key()).collect()
    }
}
