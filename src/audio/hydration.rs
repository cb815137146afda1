use serenity::model::id::{GuildId, UserId};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    notice::{Notice, Notifier},
    queue::QueueItem,
    registry::{SessionEvent, SessionRegistry},
};
use crate::{
    cache::StreamCache,
    sources::{resolve_track, ShallowTrack, TrackResolver},
};

/// Resto de una playlist pendiente de resolver
#[derive(Debug, Clone)]
pub struct HydrationJob {
    pub guild_id: GuildId,
    /// Sesión a la que pertenece el trabajo; otra sesión del mismo servidor no cuenta
    pub generation: u64,
    pub requested_by: UserId,
    pub playlist: String,
    pub entries: Vec<ShallowTrack>,
    /// Resultado de la parte síncrona (la primera canción)
    pub added: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HydrationReport {
    pub added: usize,
    pub failed: usize,
    /// La sesión desapareció antes de terminar
    pub aborted: bool,
}

/// Resuelve las entradas de una en una y las agrega a la cola al terminar cada una
pub struct Hydrator {
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) resolver: Arc<dyn TrackResolver>,
    pub(crate) cache: StreamCache,
    pub(crate) notifier: Arc<dyn Notifier>,
}

impl Hydrator {
    pub fn spawn(self, job: HydrationJob) -> JoinHandle<HydrationReport> {
        tokio::spawn(self.run(job))
    }

    pub async fn run(self, job: HydrationJob) -> HydrationReport {
        let HydrationJob {
            guild_id,
            generation,
            requested_by,
            playlist,
            entries,
            added,
            failed,
        } = job;

        let mut report = HydrationReport {
            added,
            failed,
            aborted: false,
        };
        let total = entries.len();
        info!("💧 Cargando {} canciones de '{}' en segundo plano", total, playlist);

        for (index, entry) in entries.into_iter().enumerate() {
            if !self.registry.is_live(guild_id, generation) {
                report.aborted = true;
                break;
            }

            let track = match resolve_track(self.resolver.as_ref(), &entry.locator).await {
                Ok(track) => track,
                Err(e) => {
                    warn!("⚠️ '{}' omitida: {}", entry.title, e);
                    report.failed += 1;
                    continue;
                }
            };

            let Some(handle) = self.registry.get(guild_id).filter(|h| h.generation == generation)
            else {
                report.aborted = true;
                break;
            };

            let mut item = QueueItem::from_shallow(entry, requested_by);
            item.refine(&track);
            self.cache.insert(item.locator().to_string(), track);

            let start = {
                let mut session = handle.state.lock().await;
                // Un teardown pudo ganar la carrera entre `get` y el lock
                if !self.registry.is_live(guild_id, generation) {
                    report.aborted = true;
                    break;
                }
                if let Err(e) = session.queue.enqueue(item) {
                    warn!("⚠️ {}; se descartan las canciones restantes", e);
                    report.failed += total - index;
                    break;
                }
                session.is_idle() && session.transport().is_some()
            };

            report.added += 1;
            if start {
                handle.post(SessionEvent::Start { done: None });
            }
        }

        if report.aborted {
            debug!("Sesión {} de guild {} cerrada, carga de '{}' cancelada", generation, guild_id, playlist);
            return report;
        }

        info!(
            "✅ Playlist '{}': {} agregadas, {} fallidas",
            playlist, report.added, report.failed
        );
        let summary = Notice::HydrationSummary {
            playlist,
            added: report.added,
            failed: report.failed,
        };
        if let Err(e) = self.notifier.send(guild_id, summary).await {
            warn!("No se pudo enviar el resumen de la playlist: {}", e);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::testing::RecordingNotifier,
        error::PlaybackError,
        sources::{MockTrackResolver, Resolution, ResolvedTrack},
    };
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn shallow(name: &str) -> ShallowTrack {
        ShallowTrack {
            locator: format!("https://youtu.be/{name}"),
            title: name.to_string(),
        }
    }

    fn resolved(locator: &str) -> ResolvedTrack {
        let name = locator.rsplit('/').next().unwrap_or(locator);
        ResolvedTrack {
            locator: locator.to_string(),
            stream_url: format!("https://cdn.test/{name}"),
            title: format!("{name} (oficial)"),
            duration: Some(Duration::from_secs(200)),
            thumbnail: None,
        }
    }

    fn job(generation: u64, names: &[&str]) -> HydrationJob {
        HydrationJob {
            guild_id: GuildId::new(1),
            generation,
            requested_by: UserId::new(9),
            playlist: "mix".to_string(),
            entries: names.iter().map(|n| shallow(n)).collect(),
            added: 1,
            failed: 0,
        }
    }

    fn hydrator(
        registry: Arc<SessionRegistry>,
        resolver: MockTrackResolver,
        notifier: Arc<RecordingNotifier>,
    ) -> Hydrator {
        Hydrator {
            registry,
            resolver: Arc::new(resolver),
            cache: StreamCache::with_ttl(Duration::from_secs(60)),
            notifier,
        }
    }

    #[tokio::test]
    async fn appends_in_order_and_skips_failures() {
        let registry = Arc::new(SessionRegistry::new(100, 0.5));
        let (handle, _rx) = registry.get_or_create(GuildId::new(1));

        let mut resolver = MockTrackResolver::new();
        resolver.expect_resolve().returning(|locator| {
            if locator.ends_with("/bad") {
                Err(PlaybackError::resolution(locator, "video privado"))
            } else {
                Ok(Resolution::Track(resolved(locator)))
            }
        });
        let notifier = Arc::new(RecordingNotifier::default());

        let report = hydrator(registry.clone(), resolver, notifier.clone())
            .run(job(handle.generation, &["b", "bad", "c"]))
            .await;

        assert_eq!(
            report,
            HydrationReport {
                added: 3,
                failed: 1,
                aborted: false
            }
        );
        let session = handle.state.lock().await;
        let titles: Vec<String> = session
            .queue()
            .peek_range(0, 10)
            .into_iter()
            .map(|i| i.title)
            .collect();
        assert_eq!(titles, vec!["b (oficial)", "c (oficial)"]);
        assert_eq!(session.queue().peek_range(0, 1)[0].locator(), "https://youtu.be/b");
        assert_eq!(
            notifier.notices(),
            vec![Notice::HydrationSummary {
                playlist: "mix".to_string(),
                added: 3,
                failed: 1
            }]
        );
    }

    #[tokio::test]
    async fn teardown_mid_hydration_stops_appending() {
        let registry = Arc::new(SessionRegistry::new(100, 0.5));
        let guild = GuildId::new(1);
        let (handle, _rx) = registry.get_or_create(guild);

        let mut resolver = MockTrackResolver::new();
        let torn_down = registry.clone();
        resolver.expect_resolve().times(1).returning(move |locator| {
            torn_down.remove(guild);
            Ok(Resolution::Track(resolved(locator)))
        });
        let notifier = Arc::new(RecordingNotifier::default());

        let report = hydrator(registry.clone(), resolver, notifier.clone())
            .run(job(handle.generation, &["b", "c", "d"]))
            .await;

        assert!(report.aborted);
        assert_eq!(report.added, 1);
        assert!(handle.state.lock().await.queue().is_empty());
        assert!(notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn a_newer_session_for_the_same_guild_is_left_alone() {
        let registry = Arc::new(SessionRegistry::new(100, 0.5));
        let guild = GuildId::new(1);
        let (old, _rx) = registry.get_or_create(guild);
        registry.remove(guild);
        let (new, _rx) = registry.get_or_create(guild);

        let mut resolver = MockTrackResolver::new();
        resolver.expect_resolve().never();
        let notifier = Arc::new(RecordingNotifier::default());

        let report = hydrator(registry.clone(), resolver, notifier)
            .run(job(old.generation, &["b"]))
            .await;

        assert!(report.aborted);
        assert!(new.state.lock().await.queue().is_empty());
    }

    #[tokio::test]
    async fn full_queue_drops_the_rest() {
        let registry = Arc::new(SessionRegistry::new(1, 0.5));
        let (handle, _rx) = registry.get_or_create(GuildId::new(1));

        let mut resolver = MockTrackResolver::new();
        resolver
            .expect_resolve()
            .returning(|locator| Ok(Resolution::Track(resolved(locator))));
        let notifier = Arc::new(RecordingNotifier::default());

        let report = hydrator(registry.clone(), resolver, notifier)
            .run(job(handle.generation, &["b", "c", "d"]))
            .await;

        assert_eq!(report.added, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(handle.state.lock().await.queue().len(), 1);
    }
}
