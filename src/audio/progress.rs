use std::time::{Duration, Instant};

const BAR_CELLS: usize = 20;
const BAR_FILL: &str = "▬";
const BAR_MARKER: &str = "🔘";

/// Reloj de progreso de la canción actual; excluye el tiempo en pausa
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressClock {
    progress_anchor: Option<Instant>,
    pause_anchor: Option<Instant>,
}

impl ProgressClock {
    /// Comienza un nuevo segmento de reproducción
    pub fn start(&mut self, now: Instant) {
        self.progress_anchor = Some(now);
        self.pause_anchor = None;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// No-op si ya está en pausa o no hay reproducción
    pub fn pause(&mut self, now: Instant) -> bool {
        if self.progress_anchor.is_none() || self.pause_anchor.is_some() {
            return false;
        }
        self.pause_anchor = Some(now);
        true
    }

    /// Desplaza el ancla de progreso por la duración de la pausa
    pub fn resume(&mut self, now: Instant) -> bool {
        let (Some(anchor), Some(paused_at)) = (self.progress_anchor, self.pause_anchor) else {
            return false;
        };
        self.progress_anchor = Some(anchor + now.saturating_duration_since(paused_at));
        self.pause_anchor = None;
        true
    }

    pub fn is_paused(&self) -> bool {
        self.pause_anchor.is_some()
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        let Some(anchor) = self.progress_anchor else {
            return Duration::ZERO;
        };
        let until = self.pause_anchor.unwrap_or(now);
        until.saturating_duration_since(anchor)
    }
}

/// Barra de progreso de ancho fijo; sin duración solo muestra el tiempo transcurrido
pub fn render_progress(elapsed: Duration, duration: Option<Duration>) -> String {
    let Some(total) = duration.filter(|d| !d.is_zero()) else {
        return format!("`{}` 🔴 EN VIVO", format_duration(elapsed));
    };

    let ratio = (elapsed.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0);
    let marker = ((ratio * BAR_CELLS as f64) as usize).min(BAR_CELLS - 1);

    let bar: String = (0..BAR_CELLS)
        .map(|cell| if cell == marker { BAR_MARKER } else { BAR_FILL })
        .collect();

    format!(
        "{} `{} / {}`",
        bar,
        format_duration(elapsed.min(total)),
        format_duration(total)
    )
}

/// Formatea una duración en formato legible
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
