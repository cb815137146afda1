use dashmap::DashMap;
use serenity::model::id::UserId;
use std::time::{Duration, Instant};
use tracing::debug;

/// Cambio de presencia de un usuario en canales de voz
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceTransition {
    Joined,
    /// Salió; lleva el tiempo acumulado desde que entró
    Left(Duration),
    /// Salió sin entrada registrada (el bot arrancó después)
    LeftUntracked,
    /// Cambio de canal o de estado (mute, deaf); el contador sigue
    Unchanged,
}

/// Tiempo en canales de voz de usuarios humanos
#[derive(Default)]
pub struct VoiceTracker {
    joined: DashMap<UserId, Instant>,
}

impl VoiceTracker {
    /// Empieza a contar si el usuario no estaba registrado
    pub fn track(&self, user_id: UserId, now: Instant) {
        self.joined.entry(user_id).or_insert(now);
    }

    pub fn update(&self, user_id: UserId, was_in_voice: bool, is_in_voice: bool, now: Instant) -> VoiceTransition {
        match (was_in_voice, is_in_voice) {
            (false, true) => {
                self.joined.insert(user_id, now);
                debug!("🎤 {} entró a voz", user_id);
                VoiceTransition::Joined
            }
            (true, false) => match self.joined.remove(&user_id) {
                Some((_, since)) => VoiceTransition::Left(now.saturating_duration_since(since)),
                None => VoiceTransition::LeftUntracked,
            },
            _ => VoiceTransition::Unchanged,
        }
    }

    pub fn tracked(&self) -> usize {
        self.joined.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn join_then_leave_reports_elapsed_time() {
        let tracker = VoiceTracker::default();
        let user = UserId::new(1);
        let start = Instant::now();

        assert_eq!(tracker.update(user, false, true, start), VoiceTransition::Joined);
        let left = tracker.update(user, true, false, start + Duration::from_secs(90));

        assert_eq!(left, VoiceTransition::Left(Duration::from_secs(90)));
        assert_eq!(tracker.tracked(), 0);
    }

    #[test]
    fn switching_channels_keeps_the_timer() {
        let tracker = VoiceTracker::default();
        let user = UserId::new(1);
        let start = Instant::now();

        tracker.update(user, false, true, start);
        assert_eq!(
            tracker.update(user, true, true, start + Duration::from_secs(30)),
            VoiceTransition::Unchanged
        );
        assert_eq!(
            tracker.update(user, true, false, start + Duration::from_secs(60)),
            VoiceTransition::Left(Duration::from_secs(60))
        );
    }

    #[test]
    fn leaving_without_a_join_is_untracked() {
        let tracker = VoiceTracker::default();
        assert_eq!(
            tracker.update(UserId::new(2), true, false, Instant::now()),
            VoiceTransition::LeftUntracked
        );
    }

    #[test]
    fn track_does_not_reset_an_existing_timer() {
        let tracker = VoiceTracker::default();
        let user = UserId::new(3);
        let start = Instant::now();

        tracker.track(user, start);
        tracker.track(user, start + Duration::from_secs(100));

        assert_eq!(
            tracker.update(user, true, false, start + Duration::from_secs(120)),
            VoiceTransition::Left(Duration::from_secs(120))
        );
    }
}
