//! # UI Module
//!
//! Discord embeds and message components.
//!
//! - [`embeds`]: now playing, queue pages, playlist progress, level and
//!   profile cards, help
//! - [`buttons`]: player controls attached to the now-playing notice and the
//!   profile refresh button

pub mod buttons;
pub mod embeds;
