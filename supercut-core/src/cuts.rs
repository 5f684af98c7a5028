//! Turning subtitle matches into the ordered segment list the renderer takes.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::{
    library::SubtitleLibrary,
    segment::Segment,
    subtitle::{clip_to, query_events, timeline::snap_to_centiseconds, SubtitleDocument},
};

/// What to look for in the subtitles.
#[derive(Debug, Clone, Copy)]
pub struct Criteria<'a> {
    pub query:    &'a str,
    /// Only lines spoken by this speaker (case-insensitive).
    pub name:     Option<&'a str>,
    pub language: &'a str,
}

/// One matching subtitle line and the range of its video it covers.
#[derive(Debug, Clone)]
pub struct Cut {
    pub video:    PathBuf,
    pub start_ms: i64,
    pub end_ms:   i64,
    pub speaker:  String,
    /// Line text without markup.
    pub text:     String,
    source:       Arc<SubtitleDocument>,
}

impl Cut {
    #[inline]
    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    /// `speaker: text`, on a single line.
    #[inline]
    pub fn describe(&self) -> String {
        let text = self.text.replace('\n', " ").replace("  ", " ");
        format!("{}: {}", self.speaker, text)
    }

    /// The segment for this cut, carrying the source subtitles moved onto
    /// the cut's own timeline.
    #[inline]
    pub fn to_segment(&self) -> Result<Segment> {
        let clipped = clip_to(&self.source, self.start_ms, self.end_ms);
        let subtitles = snap_to_centiseconds(&clipped).to_ass_string();
        let start = u64::try_from(self.start_ms).with_context(|| format!("Cut starts before 0: {}ms", self.start_ms))?;
        let end = u64::try_from(self.end_ms).with_context(|| format!("Cut ends before 0: {}ms", self.end_ms))?;

        Segment::new(&self.video, subtitles, start, end)
            .with_context(|| format!("Invalid cut in {}", self.video.display()))
    }
}

/// Matches in `document`, in document order. Lines without duration cannot
/// be cut and are skipped.
#[inline]
pub fn cuts_in(video: &Path, document: &Arc<SubtitleDocument>, criteria: &Criteria) -> Vec<Cut> {
    query_events(document, criteria.query, criteria.name)
        .into_iter()
        .filter(|event| {
            let usable = event.start < event.end;
            if !usable {
                warn!("skipping zero-length line at {}ms in {}", event.start, video.display());
            }
            usable
        })
        .map(|event| Cut {
            video:    video.to_path_buf(),
            start_ms: event.start,
            end_ms:   event.end,
            speaker:  event.name.clone(),
            text:     event.plain_text(),
            source:   Arc::clone(document),
        })
        .collect()
}

/// All matches across `videos`, grouped by video in the given order.
#[inline]
pub fn find_cuts(library: &SubtitleLibrary, videos: &[PathBuf], criteria: &Criteria) -> Result<Vec<Cut>> {
    let documents = library.get_many(videos, criteria.language)?;

    let cuts: Vec<Cut> = videos
        .iter()
        .zip(&documents)
        .flat_map(|(video, document)| cuts_in(video, document, criteria))
        .collect();
    debug!("{} matches for {:?} in {} videos", cuts.len(), criteria.query, videos.len());

    Ok(cuts)
}

#[inline]
pub fn build_segments(cuts: &[Cut]) -> Result<Vec<Segment>> {
    cuts.iter().map(Cut::to_segment).collect()
}
