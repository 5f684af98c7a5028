//! Core of the supercut generator.
//!
//! Subtitle tracks are searched for matching lines, each match becomes a
//! [`Segment`] of its source video, and the [`pipeline::Renderer`] stitches
//! the segments into a single video whose subtitle track lines up with the
//! new timeline.

pub mod cuts;
pub mod edit_list;
pub mod export;
pub mod ffmpeg;
pub mod library;
pub mod pipeline;
pub mod player;
pub mod progress_bar;
pub mod segment;
pub mod string_or_bytes;
pub mod subtitle;
pub mod util;

pub use crate::{
    cuts::{Criteria, Cut},
    ffmpeg::Ffmpeg,
    library::SubtitleLibrary,
    pipeline::Renderer,
    segment::Segment,
    subtitle::SubtitleDocument,
};

/// Subtitle language used when no other is configured.
pub const DEFAULT_LANGUAGE: &str = "eng";
