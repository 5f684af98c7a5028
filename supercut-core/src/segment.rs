use std::path::{Path, PathBuf};

use thiserror::Error;

/// One contiguous piece of a source video that becomes part of the output,
/// together with the subtitles that belong to it.
///
/// The subtitle payload is a serialized ASS document whose timestamps are
/// already relative to the segment start. A segment is immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    source:    PathBuf,
    subtitles: String,
    start_ms:  u64,
    end_ms:    u64,
}

impl Segment {
    #[inline]
    pub fn new(
        source: impl Into<PathBuf>,
        subtitles: impl Into<String>,
        start_ms: u64,
        end_ms: u64,
    ) -> Result<Self, SegmentError> {
        if start_ms >= end_ms {
            return Err(SegmentError::EmptyRange {
                start_ms,
                end_ms,
            });
        }

        Ok(Self {
            source: source.into(),
            subtitles: subtitles.into(),
            start_ms,
            end_ms,
        })
    }

    #[inline]
    pub fn source(&self) -> &Path {
        &self.source
    }

    #[inline]
    pub fn subtitles(&self) -> &str {
        &self.subtitles
    }

    #[inline]
    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    #[inline]
    pub fn end_ms(&self) -> u64 {
        self.end_ms
    }

    #[inline]
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }

    /// Duration in the unit ffmpeg reports progress in.
    #[inline]
    pub fn duration_us(&self) -> u64 {
        self.duration_ms().saturating_mul(1000)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SegmentError {
    #[error("Segment range {start_ms}ms..{end_ms}ms is empty")]
    EmptyRange { start_ms: u64, end_ms: u64 },
}
