use serenity::model::id::{GuildId, UserId};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::{
    hydration::{HydrationJob, Hydrator},
    notice::{Notice, NoticeHandle, Notifier},
    queue::{LoopMode, MusicQueue, QueueItem, QueuePage},
    registry::{SessionEvent, SessionHandle, SessionRegistry},
    session::{NowPlaying, PlaybackSession, DEFAULT_VOLUME},
    transport::{CompletionHook, TransportSink},
};
use crate::{
    cache::StreamCache,
    error::{PlaybackError, Result},
    sources::{resolve_track, Resolution, ResolvedTrack, TrackResolver},
    storage::StatsRecorder,
};

/// Límites y valores por defecto del motor
#[derive(Debug, Clone, Copy)]
pub struct PlayerSettings {
    pub max_queue_size: usize,
    pub max_playlist_size: usize,
    pub queue_page_size: usize,
    pub default_volume: f32,
    pub stream_cache_ttl: Duration,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            max_queue_size: 1000,
            max_playlist_size: 100,
            queue_page_size: 10,
            default_volume: DEFAULT_VOLUME,
            stream_cache_ttl: Duration::from_secs(600),
        }
    }
}

/// Resultado de `enqueue`
#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueOutcome {
    /// La sesión estaba libre y la canción empezó a sonar
    Started { item: QueueItem },
    /// Agregada detrás de otras; `position` es 1-based
    Queued { item: QueueItem, position: usize },
    /// Primera canción agregada; el resto se carga en segundo plano
    Playlist {
        title: String,
        first: QueueItem,
        pending: usize,
        skipped: usize,
        started: bool,
    },
}

/// Qué autoriza a un `advance()`
#[derive(Debug, Clone, Copy)]
enum Trigger {
    /// Fin o skip de la reproducción con este token
    Epoch(u64),
    /// Arranque de una sesión sin canción actual
    Idle,
}

impl Trigger {
    fn applies(self, session: &PlaybackSession) -> bool {
        match self {
            Trigger::Epoch(token) => session.epoch() == token,
            Trigger::Idle => session.is_idle(),
        }
    }
}

/// Motor de reproducción: una sesión por servidor, un worker por sesión
#[derive(Clone)]
pub struct AudioPlayer {
    registry: Arc<SessionRegistry>,
    resolver: Arc<dyn TrackResolver>,
    stats: Arc<dyn StatsRecorder>,
    notifier: Arc<dyn Notifier>,
    stream_cache: StreamCache,
    settings: PlayerSettings,
}

impl AudioPlayer {
    pub fn new(
        settings: PlayerSettings,
        resolver: Arc<dyn TrackResolver>,
        stats: Arc<dyn StatsRecorder>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new(
                settings.max_queue_size,
                settings.default_volume,
            )),
            resolver,
            stats,
            notifier,
            stream_cache: StreamCache::with_ttl(settings.stream_cache_ttl),
            settings,
        }
    }

    pub fn stream_cache(&self) -> &StreamCache {
        &self.stream_cache
    }

    pub fn active_sessions(&self) -> usize {
        self.registry.len()
    }

    pub fn guilds(&self) -> Vec<GuildId> {
        self.registry.guilds()
    }

    /// ¿La sesión tiene un transporte conectado?
    pub async fn is_connected(&self, guild_id: GuildId) -> bool {
        match self.registry.get(guild_id) {
            Some(handle) => handle.state.lock().await.transport().is_some(),
            None => false,
        }
    }

    /// Asocia el transporte de voz a la sesión (la crea si no existe)
    pub async fn connect(&self, guild_id: GuildId, transport: Arc<dyn TransportSink>) {
        let handle = self.session(guild_id);
        let pending = {
            let mut session = handle.state.lock().await;
            session.attach_transport(transport);
            session.is_idle() && !session.queue().is_empty()
        };

        info!("🔊 Transporte conectado en guild {}", guild_id);
        if pending {
            handle.post(SessionEvent::Start { done: None });
        }
    }

    /// Resuelve `query` y lo agrega a la cola; arranca la reproducción si la sesión está libre
    pub async fn enqueue(&self, guild_id: GuildId, user: UserId, query: &str) -> Result<EnqueueOutcome> {
        let handle = self.session(guild_id);

        match self.resolver.resolve(query).await? {
            Resolution::Track(track) => {
                self.stream_cache.remember(&track);
                let item = QueueItem::from_resolved(&track, user);
                let (position, startable) = {
                    let mut session = handle.state.lock().await;
                    let position = session.queue.enqueue(item.clone())?;
                    (position, session.is_idle() && session.transport().is_some())
                };

                if startable && self.start(&handle, &item).await {
                    return Ok(EnqueueOutcome::Started { item });
                }
                info!("➕ '{}' en la posición {} (guild {})", item.title, position, guild_id);
                Ok(EnqueueOutcome::Queued { item, position })
            }
            Resolution::Playlist { title, mut entries } => {
                if entries.is_empty() {
                    return Err(PlaybackError::NoResults(query.to_string()));
                }
                entries.truncate(self.settings.max_playlist_size);
                info!("📋 Playlist '{}' con {} canciones", title, entries.len());

                // La primera canción que resuelva se agrega ya
                let mut skipped = 0;
                let mut rest = entries.into_iter();
                let first = loop {
                    let Some(entry) = rest.next() else {
                        return Err(PlaybackError::NoResults(title));
                    };
                    match resolve_track(self.resolver.as_ref(), &entry.locator).await {
                        Ok(track) => {
                            let mut item = QueueItem::from_shallow(entry, user);
                            item.refine(&track);
                            self.stream_cache.insert(item.locator().to_string(), track);
                            break item;
                        }
                        Err(e) => {
                            warn!("⚠️ '{}' omitida: {}", entry.title, e);
                            skipped += 1;
                        }
                    }
                };

                let startable = {
                    let mut session = handle.state.lock().await;
                    session.queue.enqueue(first.clone())?;
                    session.is_idle() && session.transport().is_some()
                };
                let started = startable && self.start(&handle, &first).await;

                let pending: Vec<_> = rest.collect();
                let outcome = EnqueueOutcome::Playlist {
                    title: title.clone(),
                    first,
                    pending: pending.len(),
                    skipped,
                    started,
                };

                self.hydrator().spawn(HydrationJob {
                    guild_id,
                    generation: handle.generation,
                    requested_by: user,
                    playlist: title,
                    entries: pending,
                    added: 1,
                    failed: skipped,
                });

                Ok(outcome)
            }
        }
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<bool> {
        let handle = self.existing(guild_id)?;
        let mut session = handle.state.lock().await;
        if session.current().is_none() {
            return Err(PlaybackError::NothingPlaying);
        }
        let transport = session.transport().ok_or(PlaybackError::NotConnected)?;
        if !session.pause(Instant::now()) {
            return Ok(false);
        }
        transport.pause().await?;
        info!("⏸️ Pausado en guild {}", guild_id);
        Ok(true)
    }

    pub async fn resume(&self, guild_id: GuildId) -> Result<bool> {
        let handle = self.existing(guild_id)?;
        let mut session = handle.state.lock().await;
        if session.current().is_none() {
            return Err(PlaybackError::NothingPlaying);
        }
        let transport = session.transport().ok_or(PlaybackError::NotConnected)?;
        if !session.resume(Instant::now()) {
            return Ok(false);
        }
        transport.resume().await?;
        info!("▶️ Reanudado en guild {}", guild_id);
        Ok(true)
    }

    /// Vacía la cola y detiene la canción actual; la sesión queda conectada
    pub async fn stop(&self, guild_id: GuildId) -> Result<()> {
        let handle = self.existing(guild_id)?;
        let notice = {
            let mut session = handle.state.lock().await;
            let notice = session.stop();
            if let Some(transport) = session.transport() {
                transport.stop().await?;
            }
            notice
        };

        if let Some(notice) = notice {
            self.notifier.delete(notice).await;
        }
        Ok(())
    }

    /// Termina la canción actual; devuelve la canción saltada.
    ///
    /// Si la siguiente canción todavía se está resolviendo, la saltada es esa.
    pub async fn skip(&self, guild_id: GuildId) -> Result<QueueItem> {
        let handle = self.existing(guild_id)?;
        let (skipped, token) = {
            let mut session = handle.state.lock().await;
            match session.current().cloned() {
                Some(current) => {
                    let transport = session.transport().ok_or(PlaybackError::NotConnected)?;
                    let token = session.bump_epoch();
                    transport.stop().await?;
                    (current, token)
                }
                None => {
                    // El worker la descarta al ver el epoch nuevo
                    let pending = session.take_pending().ok_or(PlaybackError::NothingPlaying)?;
                    (pending, session.bump_epoch())
                }
            }
        };

        info!("⏭️ Saltando '{}' (guild {})", skipped.title, guild_id);
        self.post_and_wait(&handle, |done| SessionEvent::Skip { token, done }).await;
        Ok(skipped)
    }

    /// Salta a la posición `index` (1-based) de la cola.
    ///
    /// La canción elegida pasa al frente; el resto de la cola conserva su orden.
    pub async fn skip_to(&self, guild_id: GuildId, index: usize) -> Result<QueueItem> {
        let handle = self.existing(guild_id)?;
        let (target, token) = {
            let mut session = handle.state.lock().await;
            let transport = session.transport().ok_or(PlaybackError::NotConnected)?;
            let target = session.queue.skip_to(index)?.clone();
            let token = if session.is_idle() {
                None
            } else {
                session.jump_to_head();
                if let Some(pending) = session.take_pending() {
                    // No llegó a sonar: queda detrás de la elegida
                    debug!("'{}' vuelve a la cola detrás de '{}'", pending.title, target.title);
                    session.queue.reinsert(1, pending);
                }
                let token = session.bump_epoch();
                if session.current().is_some() {
                    transport.stop().await?;
                }
                Some(token)
            };
            (target, token)
        };

        info!("⏭️ Saltando a '{}' (posición {}, guild {})", target.title, index, guild_id);
        match token {
            Some(token) => {
                self.post_and_wait(&handle, |done| SessionEvent::Skip { token, done }).await
            }
            None => self.post_and_wait(&handle, |done| SessionEvent::Start { done }).await,
        }
        Ok(target)
    }

    /// Off -> Track -> Queue -> Off
    pub async fn toggle_loop(&self, guild_id: GuildId) -> Result<LoopMode> {
        let handle = self.existing(guild_id)?;
        let mut session = handle.state.lock().await;
        let mode = session.loop_mode().next();
        session.set_loop_mode(mode);
        Ok(mode)
    }

    pub async fn set_loop_mode(&self, guild_id: GuildId, mode: LoopMode) -> Result<()> {
        let handle = self.existing(guild_id)?;
        handle.state.lock().await.set_loop_mode(mode);
        Ok(())
    }

    /// Volumen en porcentaje (0-100); devuelve el volumen aplicado en [0, 1]
    pub async fn set_volume(&self, guild_id: GuildId, percent: u8) -> Result<f32> {
        let handle = self.existing(guild_id)?;
        let mut session = handle.state.lock().await;
        session.set_volume(f32::from(percent.min(100)) / 100.0);
        let volume = session.volume();
        if let Some(transport) = session.transport() {
            transport.set_volume(volume).await?;
        }
        info!("🔊 Volumen {}% en guild {}", percent.min(100), guild_id);
        Ok(volume)
    }

    pub async fn volume(&self, guild_id: GuildId) -> f32 {
        match self.registry.get(guild_id) {
            Some(handle) => handle.state.lock().await.volume(),
            None => self.settings.default_volume,
        }
    }

    pub async fn queue_page(&self, guild_id: GuildId, page: usize) -> QueuePage {
        let per_page = self.settings.queue_page_size;
        match self.registry.get(guild_id) {
            Some(handle) => handle.state.lock().await.queue().page(page, per_page),
            None => MusicQueue::new(0).page(page, per_page),
        }
    }

    pub async fn now_playing(&self, guild_id: GuildId) -> Option<NowPlaying> {
        let handle = self.registry.get(guild_id)?;
        let session = handle.state.lock().await;
        session.now_playing(Instant::now())
    }

    /// Cierra la sesión y desconecta el transporte; sin sesión no hace nada
    pub async fn teardown(&self, guild_id: GuildId) -> Result<bool> {
        let Some(handle) = self.registry.remove(guild_id) else {
            return Ok(false);
        };

        let (transport, notice) = {
            let mut session = handle.state.lock().await;
            let transport = session.transport();
            (transport, session.reset())
        };

        if let Some(notice) = notice {
            self.notifier.delete(notice).await;
        }
        if let Some(transport) = transport {
            transport.stop().await?;
            transport.disconnect().await?;
        }

        info!("👋 Sesión de guild {} cerrada", guild_id);
        Ok(true)
    }

    fn existing(&self, guild_id: GuildId) -> Result<SessionHandle> {
        self.registry.get(guild_id).ok_or(PlaybackError::NotConnected)
    }

    /// Sesión del servidor; al crearla lanza su worker
    fn session(&self, guild_id: GuildId) -> SessionHandle {
        let (handle, events) = self.registry.get_or_create(guild_id);
        if let Some(events) = events {
            tokio::spawn(self.clone().run_worker(guild_id, handle.generation, events));
        }
        handle
    }

    fn hydrator(&self) -> Hydrator {
        Hydrator {
            registry: self.registry.clone(),
            resolver: self.resolver.clone(),
            cache: self.stream_cache.clone(),
            notifier: self.notifier.clone(),
        }
    }

    /// Pide al worker que arranque y espera; `true` si `item` quedó sonando
    async fn start(&self, handle: &SessionHandle, item: &QueueItem) -> bool {
        self.post_and_wait(handle, |done| SessionEvent::Start { done }).await;
        let session = handle.state.lock().await;
        session.current().is_some_and(|c| c.locator() == item.locator())
    }

    async fn post_and_wait(
        &self,
        handle: &SessionHandle,
        event: impl FnOnce(Option<oneshot::Sender<()>>) -> SessionEvent,
    ) {
        let (done, committed) = oneshot::channel();
        if handle.post(event(Some(done))) {
            // El worker puede cerrarse por un teardown concurrente
            let _ = committed.await;
        }
    }

    async fn run_worker(
        self,
        guild_id: GuildId,
        generation: u64,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        debug!("Worker de sesión {} iniciado (guild {})", generation, guild_id);

        while let Some(event) = events.recv().await {
            let Some(handle) = self.registry.get(guild_id).filter(|h| h.generation == generation)
            else {
                break;
            };

            match event {
                SessionEvent::TrackEnded { token } => {
                    self.advance(guild_id, &handle, Trigger::Epoch(token)).await;
                }
                SessionEvent::TrackFailed { token, reason } => {
                    self.drop_failed(guild_id, &handle, token, reason).await;
                }
                SessionEvent::Start { done } => {
                    self.advance(guild_id, &handle, Trigger::Idle).await;
                    acknowledge(done);
                }
                SessionEvent::Skip { token, done } => {
                    self.advance(guild_id, &handle, Trigger::Epoch(token)).await;
                    acknowledge(done);
                }
            }
        }

        debug!("Worker de sesión {} finalizado (guild {})", generation, guild_id);
    }

    /// El stream de la canción actual se cortó: se reporta y se descarta
    /// sin pasar por el modo de loop.
    async fn drop_failed(&self, guild_id: GuildId, handle: &SessionHandle, token: u64, reason: String) {
        let failed = {
            let mut session = handle.state.lock().await;
            if session.epoch() != token {
                debug!("Error de canción obsoleto ignorado (token {}, guild {})", token, guild_id);
                return;
            }
            session.discard_current()
        };

        if let Some(entry) = failed {
            self.report_failure(guild_id, &entry, &PlaybackError::Transport(reason)).await;
        }
        self.advance(guild_id, handle, Trigger::Idle).await;
    }

    /// Pasa a la siguiente canción según el modo de loop.
    ///
    /// Solo corre en el worker de la sesión. La resolución ocurre fuera del
    /// lock; si la sesión cambió de epoch mientras tanto, el resultado se
    /// descarta. Las canciones que fallan se reportan y se prueba la siguiente.
    async fn advance(&self, guild_id: GuildId, handle: &SessionHandle, trigger: Trigger) {
        let mut trigger = Some(trigger);

        loop {
            let (mut entry, epoch) = {
                let mut session = handle.state.lock().await;
                if let Some(trigger) = trigger.take() {
                    if !trigger.applies(&session) {
                        debug!("Evento obsoleto ignorado ({:?}, guild {})", trigger, guild_id);
                        return;
                    }
                }
                // Entrada de un intento fallido
                session.take_pending();
                if session.transport().is_none() {
                    debug!("Guild {} sin transporte, la cola espera", guild_id);
                    return;
                }
                match session.next_entry() {
                    Some(entry) => (entry, session.epoch()),
                    None => {
                        session.finish();
                        return;
                    }
                }
            };

            let track = match self.fresh_stream(&entry).await {
                Ok(track) => track,
                Err(e) => {
                    self.report_failure(guild_id, &entry, &e).await;
                    continue;
                }
            };
            entry.refine(&track);

            let mut session = handle.state.lock().await;
            if session.epoch() != epoch {
                debug!("'{}' descartada: la sesión cambió durante la resolución", entry.title);
                session.take_pending();
                return;
            }
            let Some(transport) = session.transport() else {
                session.take_pending();
                return;
            };

            let volume = session.volume();
            let loop_mode = session.loop_mode();
            let token = session.begin(entry.clone(), Instant::now());
            let hook = CompletionHook::new(token, handle.events.clone());

            if let Err(e) = transport.play(&track.stream_url, volume, hook).await {
                session.discard_current();
                drop(session);
                self.report_failure(guild_id, &entry, &e).await;
                if e.is_per_track() {
                    continue;
                }
                // Sin llamada de voz el resto de la cola espera al próximo connect
                warn!("⚠️ Guild {} sin conexión de voz, la cola queda en espera", guild_id);
                return;
            }

            let stale_notice = session.take_notice();
            drop(session);

            self.record_play(entry.requested_by, guild_id);
            self.announce(guild_id, handle, entry, loop_mode, token, stale_notice)
                .await;
            return;
        }
    }

    async fn fresh_stream(&self, entry: &QueueItem) -> Result<ResolvedTrack> {
        if let Some(track) = self.stream_cache.take(&entry.locator().to_string()) {
            debug!("⚡ Stream en cache para '{}'", entry.title);
            return Ok(track);
        }
        resolve_track(self.resolver.as_ref(), entry.locator()).await
    }

    async fn report_failure(&self, guild_id: GuildId, entry: &QueueItem, e: &PlaybackError) {
        error!("❌ No se pudo reproducir '{}': {}", entry.title, e);
        let notice = Notice::TrackFailed {
            title: entry.title.clone(),
            reason: e.to_string(),
        };
        if let Err(e) = self.notifier.send(guild_id, notice).await {
            warn!("No se pudo avisar el error: {}", e);
        }
    }

    fn record_play(&self, user_id: UserId, guild_id: GuildId) {
        let stats = self.stats.clone();
        tokio::spawn(async move {
            if let Err(e) = stats.record_play(user_id, guild_id).await {
                warn!("No se pudo registrar la reproducción de {}: {}", user_id, e);
            }
        });
    }

    /// Reemplaza el aviso "now playing" de la sesión
    async fn announce(
        &self,
        guild_id: GuildId,
        handle: &SessionHandle,
        item: QueueItem,
        loop_mode: LoopMode,
        token: u64,
        stale: Option<NoticeHandle>,
    ) {
        if let Some(stale) = stale {
            self.notifier.delete(stale).await;
        }

        let notice = match self.notifier.send(guild_id, Notice::NowPlaying { item, loop_mode }).await {
            Ok(notice) => notice,
            Err(e) => {
                warn!("No se pudo enviar 'now playing': {}", e);
                return;
            }
        };

        let displaced = {
            let mut session = handle.state.lock().await;
            if session.epoch() == token {
                session.replace_notice(notice)
            } else {
                Some(notice)
            }
        };
        if let Some(displaced) = displaced {
            self.notifier.delete(displaced).await;
        }
    }
}

fn acknowledge(done: Option<oneshot::Sender<()>>) {
    if let Some(done) = done {
        let _ = done.send(());
    }
}
