//! Core business logic for aiponge.
//!
//! - [`services`]: invitation acceptance, creator-member relationships and
//!   guest conversion, each over the relational store
//! - [`lyrics`]: pure lyrics timestamp estimation

#![allow(missing_docs)]

pub mod lyrics;
pub mod services;

pub use lyrics::{
    SectionType, SyncedLine, adjust_timestamps_to_song_duration, format_lrc,
    generate_lyrics_timestamps,
};
pub use services::*;
