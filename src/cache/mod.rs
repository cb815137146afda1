//! # Cache Module
//!
//! Short-lived cache of resolved streams.
//!
//! Direct stream URLs expire, so the engine normally re-resolves a track's
//! locator right before playing it. When the same locator was resolved very
//! recently (by the play command or the hydration task) the fresh result is
//! kept here and consumed by the next `advance()` instead of spawning another
//! extractor process.
//!
//! ## Configuration
//!
//! ```env
//! STREAM_CACHE_TTL_SECS=600   # 0 disables the cache
//! ```

pub mod ttl_cache;

use std::time::Duration;
use tracing::info;

use crate::sources::ResolvedTrack;
use ttl_cache::TtlCache;

const STREAM_CACHE_CAPACITY: usize = 512;

/// Streams resueltos por locator
pub type StreamCache = TtlCache<String, ResolvedTrack>;

impl StreamCache {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self::new(STREAM_CACHE_CAPACITY, ttl)
    }

    pub fn remember(&self, track: &ResolvedTrack) {
        self.insert(track.locator.clone(), track.clone());
    }

    /// Performs cache maintenance by removing expired entries.
    pub fn cleanup_old_entries(&self) {
        let removed = self.cleanup_expired();
        if removed > 0 {
            info!(
                "🧹 Cache cleanup: removed {} expired streams ({} left)",
                removed,
                self.len()
            );
        }
    }
}
