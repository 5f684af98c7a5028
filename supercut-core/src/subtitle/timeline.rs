//! Moving subtitle events onto a segment's timeline.

use crate::subtitle::{Event, SubtitleDocument};

/// Whether `event` shares any time with `[window_start, window_end)`. Touching
/// ranges do not overlap.
#[inline]
pub fn overlaps(event: &Event, window_start: i64, window_end: i64) -> bool {
    event.end > window_start && event.start < window_end
}

/// Copies `document` keeping only the events inside the window, shifted so the
/// window starts at zero and clamped to `[0, window length]`.
///
/// Events that start before the window are truncated rather than dropped.
/// Events left with no duration after clamping are dropped.
#[inline]
pub fn clip_to(document: &SubtitleDocument, window_start: i64, window_end: i64) -> SubtitleDocument {
    let length = window_end - window_start;

    let events = document
        .events
        .iter()
        .filter(|event| overlaps(event, window_start, window_end))
        .filter_map(|event| {
            let start = (event.start - window_start).max(0);
            let end = (event.end - window_start).min(length);
            (start < end).then(|| Event {
                start,
                end,
                ..event.clone()
            })
        })
        .collect();

    document.with_replaced_events(events)
}

/// Centiseconds are the finest unit an ASS timestamp holds.
const ASS_RESOLUTION_MS: i64 = 10;

/// Rounds event starts up and ends down to whole centiseconds, so a document
/// written as ASS keeps every event inside its original range. Events too short
/// to survive the rounding are dropped.
#[inline]
pub fn snap_to_centiseconds(document: &SubtitleDocument) -> SubtitleDocument {
    let events = document
        .events
        .iter()
        .filter_map(|event| {
            let start = event.start + (-event.start).rem_euclid(ASS_RESOLUTION_MS);
            let end = event.end - event.end.rem_euclid(ASS_RESOLUTION_MS);
            (start < end).then(|| Event {
                start,
                end,
                ..event.clone()
            })
        })
        .collect();

    document.with_replaced_events(events)
}
