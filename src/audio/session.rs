use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, info};

use super::{
    notice::NoticeHandle,
    progress::ProgressClock,
    queue::{LoopMode, MusicQueue, QueueItem},
    transport::TransportSink,
};

pub const DEFAULT_VOLUME: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// Estado mutable de una sesión de reproducción (un servidor)
pub struct PlaybackSession {
    pub(crate) queue: MusicQueue,
    current: Option<QueueItem>,
    /// Entrada que `advance()` sacó de la cola y todavía se está resolviendo
    pending: Option<QueueItem>,
    loop_mode: LoopMode,
    volume: f32,
    default_volume: f32,
    clock: ProgressClock,
    last_notice: Option<NoticeHandle>,
    transport: Option<Arc<dyn TransportSink>>,
    /// Se incrementa en cada inicio, stop o skip; invalida callbacks viejos
    epoch: u64,
    /// El próximo avance toma la cabeza de la cola aunque haya loop de canción
    jump_to_head: bool,
}

/// Vista de la canción actual para la UI
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub item: QueueItem,
    pub elapsed: Duration,
    pub state: PlaybackState,
    pub loop_mode: LoopMode,
    pub volume: f32,
    pub queued: usize,
}

impl PlaybackSession {
    pub fn new(max_queue_size: usize, default_volume: f32) -> Self {
        Self {
            queue: MusicQueue::new(max_queue_size),
            current: None,
            pending: None,
            loop_mode: LoopMode::Off,
            volume: default_volume,
            default_volume,
            clock: ProgressClock::default(),
            last_notice: None,
            transport: None,
            epoch: 0,
            jump_to_head: false,
        }
    }

    pub fn state(&self) -> PlaybackState {
        match (&self.current, self.clock.is_paused()) {
            (None, _) => PlaybackState::Idle,
            (Some(_), true) => PlaybackState::Paused,
            (Some(_), false) => PlaybackState::Playing,
        }
    }

    /// Sin canción sonando ni en camino
    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.pending.is_none()
    }

    pub fn current(&self) -> Option<&QueueItem> {
        self.current.as_ref()
    }

    pub fn queue(&self) -> &MusicQueue {
        &self.queue
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
        info!("{}", mode.label());
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Invalida cualquier callback de transporte pendiente
    pub fn bump_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    pub fn transport(&self) -> Option<Arc<dyn TransportSink>> {
        self.transport.clone()
    }

    pub fn attach_transport(&mut self, transport: Arc<dyn TransportSink>) -> Option<Arc<dyn TransportSink>> {
        self.transport.replace(transport)
    }

    pub fn take_notice(&mut self) -> Option<NoticeHandle> {
        self.last_notice.take()
    }

    /// Reemplaza el aviso "now playing"; devuelve el anterior para borrarlo
    pub fn replace_notice(&mut self, notice: NoticeHandle) -> Option<NoticeHandle> {
        self.last_notice.replace(notice)
    }

    /// Elige la siguiente canción según el modo de loop.
    ///
    /// `current` queda vacío: si la resolución falla, el intento siguiente
    /// no vuelve a elegir la misma entrada.
    pub fn next_entry(&mut self) -> Option<QueueItem> {
        let previous = self.current.take();
        let jump = std::mem::take(&mut self.jump_to_head);
        self.clock.reset();

        let replay = match (self.loop_mode, previous) {
            (LoopMode::Track, Some(previous)) if !jump => {
                debug!("🔂 Repitiendo: {}", previous.title);
                Some(previous)
            }
            (LoopMode::Queue, Some(previous)) => {
                debug!("🔁 '{}' vuelve al final de la cola", previous.title);
                self.queue.requeue(previous);
                None
            }
            _ => None,
        };

        self.pending = replay.or_else(|| self.queue.pop_front());
        self.pending.clone()
    }

    /// Suelta la entrada en camino; quien la tome decide si vuelve a la cola
    pub fn take_pending(&mut self) -> Option<QueueItem> {
        self.pending.take()
    }

    /// Tras un `skip_to`: la canción movida al frente gana sobre el loop de canción
    pub fn jump_to_head(&mut self) {
        self.jump_to_head = true;
    }

    /// Comienza a reproducir `item` (Idle/transición -> Playing)
    pub fn begin(&mut self, item: QueueItem, now: Instant) -> u64 {
        info!("🎵 Reproduciendo: {}", item.title);
        self.current = Some(item);
        self.pending = None;
        self.clock.start(now);
        self.bump_epoch()
    }

    /// Sin siguiente canción: la sesión queda Idle
    pub fn finish(&mut self) {
        self.current = None;
        self.pending = None;
        self.clock.reset();
        self.bump_epoch();
        info!("📭 Cola vacía, sesión en espera");
    }

    /// El transporte rechazó la canción: se descarta sin volver a la cola
    pub fn discard_current(&mut self) -> Option<QueueItem> {
        self.clock.reset();
        self.bump_epoch();
        self.current.take()
    }

    pub fn pause(&mut self, now: Instant) -> bool {
        self.current.is_some() && self.clock.pause(now)
    }

    pub fn resume(&mut self, now: Instant) -> bool {
        self.current.is_some() && self.clock.resume(now)
    }

    /// Playing/Paused -> Idle: limpia cola, canción actual y loop
    pub fn stop(&mut self) -> Option<NoticeHandle> {
        let cleared = self.queue.clear();
        self.current = None;
        self.pending = None;
        self.loop_mode = LoopMode::Off;
        self.jump_to_head = false;
        self.clock.reset();
        self.bump_epoch();
        info!("⏹️ Reproducción detenida ({} canciones removidas)", cleared);
        self.last_notice.take()
    }

    /// Restablece todos los campos por defecto (leave)
    pub fn reset(&mut self) -> Option<NoticeHandle> {
        let notice = self.stop();
        self.volume = self.default_volume;
        self.transport = None;
        notice
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        self.clock.elapsed(now)
    }

    pub fn now_playing(&self, now: Instant) -> Option<NowPlaying> {
        let item = self.current.clone()?;
        Some(NowPlaying {
            item,
            elapsed: self.clock.elapsed(now),
            state: self.state(),
            loop_mode: self.loop_mode,
            volume: self.volume,
            queued: self.queue.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;

    fn item(name: &str) -> QueueItem {
        QueueItem::new(format!("https://youtu.be/{name}"), name, UserId::new(1))
    }

    fn session_with(queue: &[&str], current: Option<&str>) -> PlaybackSession {
        let mut session = PlaybackSession::new(100, DEFAULT_VOLUME);
        session.queue.enqueue_many(queue.iter().map(|n| item(n)));
        if let Some(name) = current {
            session.begin(item(name), Instant::now());
        }
        session
    }

    fn queue_titles(session: &PlaybackSession) -> Vec<String> {
        session
            .queue
            .peek_range(0, session.queue.len())
            .into_iter()
            .map(|i| i.title)
            .collect()
    }

    #[test]
    fn new_session_has_defaults() {
        let session = PlaybackSession::new(10, DEFAULT_VOLUME);
        assert_eq!(session.state(), PlaybackState::Idle);
        assert_eq!(session.volume(), 0.5);
        assert_eq!(session.loop_mode(), LoopMode::Off);
        assert!(session.transport().is_none());
    }

    #[test]
    fn loop_off_takes_the_head() {
        let mut session = session_with(&["b"], Some("a"));
        assert_eq!(session.next_entry().unwrap().title, "b");
        assert!(session.queue.is_empty());
    }

    #[test]
    fn loop_off_with_empty_queue_yields_none() {
        let mut session = session_with(&[], Some("a"));
        assert!(session.next_entry().is_none());
        assert_eq!(session.state(), PlaybackState::Idle);
    }

    #[test]
    fn repeat_track_replays_without_touching_queue() {
        let mut session = session_with(&["b", "c"], Some("a"));
        session.set_loop_mode(LoopMode::Track);

        for _ in 0..5 {
            let next = session.next_entry().unwrap();
            assert_eq!(next.title, "a");
            assert_eq!(session.queue.len(), 2);
            session.begin(next, Instant::now());
        }
    }

    #[test]
    fn repeat_queue_requeues_previous() {
        let mut session = session_with(&["a", "b"], Some("c"));
        session.set_loop_mode(LoopMode::Queue);

        let next = session.next_entry().unwrap();
        assert_eq!(next.title, "a");
        assert_eq!(queue_titles(&session), vec!["b", "c"]);

        // Con "a" en curso la cola completa queda [b, c] + a al avanzar
        session.begin(next, Instant::now());
        assert_eq!(session.next_entry().unwrap().title, "b");
        assert_eq!(queue_titles(&session), vec!["c", "a"]);
    }

    #[test]
    fn repeat_queue_with_single_track_replays_it() {
        let mut session = session_with(&[], Some("solo"));
        session.set_loop_mode(LoopMode::Queue);
        assert_eq!(session.next_entry().unwrap().title, "solo");
        assert!(session.queue.is_empty());
    }

    #[test]
    fn jump_to_head_beats_repeat_track() {
        let mut session = session_with(&["b", "c"], Some("a"));
        session.set_loop_mode(LoopMode::Track);
        session.jump_to_head();

        assert_eq!(session.next_entry().unwrap().title, "b");
        session.begin(item("b"), Instant::now());
        assert_eq!(session.next_entry().unwrap().title, "b");
    }

    #[test]
    fn discarded_track_is_not_requeued() {
        let mut session = session_with(&["b"], Some("a"));
        session.set_loop_mode(LoopMode::Queue);
        assert_eq!(session.discard_current().unwrap().title, "a");

        assert_eq!(session.next_entry().unwrap().title, "b");
        assert!(session.queue.is_empty());
    }

    #[test]
    fn entry_in_flight_keeps_the_session_busy() {
        let mut session = session_with(&["b", "c"], None);
        assert!(session.is_idle());

        let next = session.next_entry().unwrap();
        assert!(!session.is_idle());
        assert_eq!(session.state(), PlaybackState::Idle);

        session.begin(next, Instant::now());
        assert!(session.take_pending().is_none());

        session.next_entry();
        session.stop();
        assert!(session.is_idle());
        assert!(session.take_pending().is_none());
    }

    #[test]
    fn pause_and_resume_require_a_current_track() {
        let now = Instant::now();
        let mut idle = PlaybackSession::new(10, DEFAULT_VOLUME);
        assert!(!idle.pause(now));

        let mut session = session_with(&[], Some("a"));
        assert!(session.pause(now));
        assert_eq!(session.state(), PlaybackState::Paused);
        assert!(!session.pause(now));
        assert!(session.resume(now));
        assert_eq!(session.state(), PlaybackState::Playing);
    }

    #[test]
    fn stop_clears_everything_but_volume() {
        let mut session = session_with(&["b", "c"], Some("a"));
        session.set_loop_mode(LoopMode::Queue);
        session.set_volume(0.8);
        let epoch = session.epoch();

        session.stop();

        assert_eq!(session.state(), PlaybackState::Idle);
        assert!(session.queue.is_empty());
        assert_eq!(session.loop_mode(), LoopMode::Off);
        assert_eq!(session.volume(), 0.8);
        assert!(session.epoch() > epoch);
    }

    #[test]
    fn reset_restores_default_volume() {
        let mut session = session_with(&["b"], Some("a"));
        session.set_volume(0.9);
        session.reset();
        assert_eq!(session.volume(), DEFAULT_VOLUME);
    }

    #[test]
    fn each_begin_gets_a_fresh_token() {
        let mut session = PlaybackSession::new(10, DEFAULT_VOLUME);
        let first = session.begin(item("a"), Instant::now());
        let second = session.begin(item("b"), Instant::now());
        assert_ne!(first, second);
        assert_eq!(session.epoch(), second);
    }

    #[test]
    fn volume_is_clamped() {
        let mut session = PlaybackSession::new(10, DEFAULT_VOLUME);
        session.set_volume(3.0);
        assert_eq!(session.volume(), 1.0);
        session.set_volume(-1.0);
        assert_eq!(session.volume(), 0.0);
    }
}
