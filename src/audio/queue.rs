use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info};

use crate::{
    error::{PlaybackError, Result},
    sources::{ResolvedTrack, ShallowTrack},
};

/// Una canción en la cola
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    locator: String,
    pub title: String,
    pub requested_by: UserId,
    pub duration: Option<Duration>,
    pub thumbnail: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn new(locator: impl Into<String>, title: impl Into<String>, requested_by: UserId) -> Self {
        Self {
            locator: locator.into(),
            title: title.into(),
            requested_by,
            duration: None,
            thumbnail: None,
            added_at: Utc::now(),
        }
    }

    pub fn from_resolved(track: &ResolvedTrack, requested_by: UserId) -> Self {
        let mut item = Self::new(track.locator.clone(), track.title.clone(), requested_by);
        item.refine(track);
        item
    }

    pub fn from_shallow(track: ShallowTrack, requested_by: UserId) -> Self {
        Self::new(track.locator, track.title, requested_by)
    }

    /// Identificador estable; nunca cambia una vez creado
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Actualiza los metadatos con una resolución más completa
    pub fn refine(&mut self, track: &ResolvedTrack) {
        if !track.title.is_empty() {
            self.title = track.title.clone();
        }
        if track.duration.is_some() {
            self.duration = track.duration;
        }
        if track.thumbnail.is_some() {
            self.thumbnail = track.thumbnail.clone();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    Off,
    /// Repite la canción actual
    Track,
    /// Devuelve cada canción terminada al final de la cola
    Queue,
}

impl LoopMode {
    /// Off -> Track -> Queue -> Off
    pub fn next(self) -> Self {
        match self {
            LoopMode::Off => LoopMode::Track,
            LoopMode::Track => LoopMode::Queue,
            LoopMode::Queue => LoopMode::Off,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "off" => Some(LoopMode::Off),
            "track" => Some(LoopMode::Track),
            "queue" => Some(LoopMode::Queue),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LoopMode::Off => "➡️ Repetición desactivada",
            LoopMode::Track => "🔂 Repitiendo la canción actual",
            LoopMode::Queue => "🔁 Repitiendo la cola",
        }
    }
}

/// Cola FIFO de una sesión
#[derive(Debug, Clone)]
pub struct MusicQueue {
    items: VecDeque<QueueItem>,
    max_size: usize,
}

impl MusicQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
        }
    }

    /// Agrega un track al final de la cola
    pub fn enqueue(&mut self, item: QueueItem) -> Result<usize> {
        if self.items.len() >= self.max_size {
            return Err(PlaybackError::QueueFull(self.max_size));
        }

        debug!("➕ Agregado a la cola: {}", item.title);
        self.items.push_back(item);
        Ok(self.items.len())
    }

    /// Agrega varios tracks respetando el orden; devuelve cuántos entraron
    pub fn enqueue_many(&mut self, items: impl IntoIterator<Item = QueueItem>) -> usize {
        let available_space = self.max_size.saturating_sub(self.items.len());
        let before = self.items.len();
        self.items.extend(items.into_iter().take(available_space));

        let added = self.items.len() - before;
        info!("➕ Agregadas {} canciones a la cola", added);
        added
    }

    /// Devuelve una canción terminada al final (loop de cola), sin límite de tamaño
    pub(crate) fn requeue(&mut self, item: QueueItem) {
        self.items.push_back(item);
    }

    /// Vuelve a poner una entrada que ya había salido de la cola, sin límite de tamaño
    pub(crate) fn reinsert(&mut self, position: usize, item: QueueItem) {
        let position = position.min(self.items.len());
        self.items.insert(position, item);
    }

    pub fn pop_front(&mut self) -> Option<QueueItem> {
        self.items.pop_front()
    }

    /// Vista de solo lectura para paginación
    pub fn peek_range(&self, offset: usize, count: usize) -> Vec<QueueItem> {
        self.items.iter().skip(offset).take(count).cloned().collect()
    }

    /// Mueve la canción en `index` (1-based) al frente de la cola
    pub fn skip_to(&mut self, index: usize) -> Result<&QueueItem> {
        let len = self.items.len();
        if index == 0 || index > len {
            return Err(PlaybackError::InvalidIndex { index, len });
        }

        let item = self
            .items
            .remove(index - 1)
            .ok_or(PlaybackError::InvalidIndex { index, len })?;
        debug!("📍 '{}' movida de la posición {} al frente", item.title, index);
        self.items.push_front(item);
        self.items.front().ok_or(PlaybackError::EmptyQueue)
    }

    pub fn clear(&mut self) -> usize {
        let cleared = self.items.len();
        self.items.clear();
        cleared
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_duration(&self) -> Duration {
        self.items.iter().filter_map(|item| item.duration).sum()
    }

    /// Obtiene una página (1-based) de la cola
    pub fn page(&self, page: usize, items_per_page: usize) -> QueuePage {
        let items_per_page = items_per_page.max(1);
        let total_items = self.items.len();
        let total_pages = total_items.div_ceil(items_per_page).max(1);
        let current_page = page.clamp(1, total_pages);
        let offset = (current_page - 1) * items_per_page;

        QueuePage {
            items: self.peek_range(offset, items_per_page),
            offset,
            current_page,
            total_pages,
            total_items,
            total_duration: self.total_duration(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueuePage {
    pub items: Vec<QueueItem>,
    /// Posición (0-based) del primer item de la página
    pub offset: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub total_duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item(name: &str) -> QueueItem {
        QueueItem::new(format!("https://youtu.be/{name}"), name, UserId::new(1))
    }

    fn titles(queue: &MusicQueue) -> Vec<String> {
        queue.peek_range(0, queue.len()).into_iter().map(|i| i.title).collect()
    }

    #[test]
    fn enqueue_preserves_insertion_order() {
        let mut queue = MusicQueue::new(10);
        for name in ["a", "b", "c"] {
            queue.enqueue(item(name)).unwrap();
        }
        queue.enqueue_many(vec![item("d"), item("e")]);

        assert_eq!(titles(&queue), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(queue.pop_front().unwrap().title, "a");
    }

    #[test]
    fn enqueue_rejects_when_full() {
        let mut queue = MusicQueue::new(1);
        queue.enqueue(item("a")).unwrap();
        assert_eq!(queue.enqueue(item("b")), Err(PlaybackError::QueueFull(1)));
        assert_eq!(queue.enqueue_many(vec![item("c")]), 0);
    }

    #[test]
    fn skip_to_moves_target_to_front() {
        let mut queue = MusicQueue::new(10);
        queue.enqueue_many(["a", "b", "c", "d"].map(item));

        assert_eq!(queue.skip_to(3).unwrap().title, "c");
        assert_eq!(titles(&queue), vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn reinsert_clamps_to_the_end() {
        let mut queue = MusicQueue::new(2);
        queue.enqueue_many(["a", "b"].map(item));

        queue.reinsert(1, item("x"));
        queue.reinsert(10, item("y"));

        assert_eq!(titles(&queue), vec!["a", "x", "b", "y"]);
    }

    #[test]
    fn skip_to_validates_range_without_mutating() {
        let mut queue = MusicQueue::new(10);
        queue.enqueue_many(["a", "b"].map(item));

        assert_eq!(
            queue.skip_to(0).unwrap_err(),
            PlaybackError::InvalidIndex { index: 0, len: 2 }
        );
        assert_eq!(
            queue.skip_to(3).unwrap_err(),
            PlaybackError::InvalidIndex { index: 3, len: 2 }
        );
        assert_eq!(titles(&queue), vec!["a", "b"]);
    }

    #[test]
    fn skip_to_any_position_selects_that_entry() {
        for len in 1..6 {
            for index in 1..=len {
                let mut queue = MusicQueue::new(10);
                let names: Vec<String> = (0..len).map(|i| format!("t{i}")).collect();
                queue.enqueue_many(names.iter().map(|n| item(n)));

                queue.skip_to(index).unwrap();
                assert_eq!(queue.pop_front().unwrap().title, names[index - 1]);
            }
        }
    }

    #[test]
    fn peek_range_never_mutates() {
        let mut queue = MusicQueue::new(10);
        queue.enqueue_many(["a", "b", "c"].map(item));

        let slice: Vec<_> = queue.peek_range(1, 5).into_iter().map(|i| i.title).collect();
        assert_eq!(slice, vec!["b", "c"]);
        assert_eq!(queue.len(), 3);
        assert!(queue.peek_range(7, 2).is_empty());
    }

    #[test]
    fn pages_are_one_based_and_clamped() {
        let mut queue = MusicQueue::new(50);
        queue.enqueue_many((0..23).map(|i| item(&i.to_string())));

        let page = queue.page(3, 10);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.offset, 20);
        assert_eq!(page.items.len(), 3);

        assert_eq!(queue.page(0, 10).current_page, 1);
        assert_eq!(queue.page(99, 10).current_page, 3);
        assert_eq!(MusicQueue::new(5).page(1, 10).total_pages, 1);
    }

    #[test]
    fn refine_keeps_locator() {
        let mut entry = item("abc");
        entry.refine(&ResolvedTrack {
            locator: "https://other".into(),
            stream_url: "https://stream".into(),
            title: "Real Title".into(),
            duration: Some(Duration::from_secs(90)),
            thumbnail: None,
        });
        assert_eq!(entry.locator(), "https://youtu.be/abc");
        assert_eq!(entry.title, "Real Title");
        assert_eq!(entry.duration, Some(Duration::from_secs(90)));
    }

    #[test]
    fn loop_mode_cycles() {
        assert_eq!(LoopMode::Off.next(), LoopMode::Track);
        assert_eq!(LoopMode::Track.next(), LoopMode::Queue);
        assert_eq!(LoopMode::Queue.next(), LoopMode::Off);
    }
}
