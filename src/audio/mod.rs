//! # Audio Module
//!
//! Per-guild playback engine for XYZ Music.
//!
//! ## Architecture
//!
//! ### [`player`] - Audio Player
//! - Entry point used by the command layer (enqueue, skip, pause, loop, volume)
//! - Owns the [`registry::SessionRegistry`] and spawns one worker per session
//! - The worker is the only place where `advance()` runs, so track
//!   transitions of one guild are strictly sequential
//!
//! ### [`session`] - Playback Session
//! - Queue, current track, loop mode, volume and progress clock of one guild
//! - An epoch counter invalidates completion callbacks of tracks that were
//!   stopped or skipped
//!
//! ### [`queue`] - Queue Management
//! - FIFO queue with 1-based `skip_to` and pagination
//! - Loop modes: off, repeat track, repeat queue
//!
//! ### [`hydration`] - Background playlist loading
//! - Resolves the remaining entries of a playlist one at a time and appends
//!   them while the first one is already playing
//!
//! ### [`transport`] - Voice output
//! - [`transport::TransportSink`] abstracts the voice connection; the
//!   production implementation streams over Songbird
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serenity::all::{GuildId, UserId};
//! use xyz_music::audio::{player::AudioPlayer, transport::TransportSink};
//!
//! # async fn example(player: AudioPlayer, voice: Arc<dyn TransportSink>) -> anyhow::Result<()> {
//! let guild_id = GuildId::new(123456789);
//! player.connect(guild_id, voice).await;
//! player.enqueue(guild_id, UserId::new(42), "lofi hip hop").await?;
//! player.pause(guild_id).await?;
//! player.skip(guild_id).await?;
//! # Ok(())
//! # }
//! ```

pub mod hydration;
pub mod notice;
pub mod player;
pub mod progress;
pub mod queue;
pub mod registry;
pub mod session;
#[cfg(test)]
pub mod testing;
pub mod transport;
