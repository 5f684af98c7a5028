//! Putting the merged subtitle track of a concatenated video back in order.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::{
    ffmpeg::{args, Ffmpeg},
    pipeline::RenderError,
    subtitle::SubtitleDocument,
};

/// Stable sort by start time: equal starts keep their relative order.
#[inline]
pub fn sort_events(document: &mut SubtitleDocument) {
    document.events.sort_by_key(|event| event.start);
}

/// Rewrites `video` into `output` with its first subtitle stream sorted.
/// `scratch` holds the sorted subtitle file.
#[tracing::instrument(level = "debug", skip(ffmpeg))]
#[inline]
pub fn repair_subtitles(ffmpeg: &Ffmpeg, video: &Path, scratch: &Path, output: &Path) -> Result<()> {
    let probe = ffmpeg.probe(video)?;
    if probe.subtitle_streams().next().is_none() {
        bail!(RenderError::MissingSubtitleStream {
            path: video.to_path_buf(),
        });
    }

    let raw = ffmpeg.extract_subtitles(video, 0)?;
    let mut document = SubtitleDocument::parse_ass(&raw)
        .with_context(|| format!("Merged subtitles of {} are unreadable", video.display()))?;
    sort_events(&mut document);
    info!("sorted {} subtitle events", document.events.len());

    let subtitles = scratch.join("repaired.ass");
    fs::write(&subtitles, document.to_ass_string())
        .with_context(|| format!("Failed to write {}", subtitles.display()))?;

    ffmpeg.run(args::replace_subtitles(video, &subtitles, output))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::Event;

    #[test]
    fn sorts_by_start() {
        let mut document = SubtitleDocument::with_events(vec![
            Event::dialogue(500, 900, "third"),
            Event::dialogue(100, 400, "first"),
            Event::dialogue(300, 700, "second"),
        ]);
        sort_events(&mut document);

        let order: Vec<(i64, &str)> = document.events.iter().map(|event| (event.start, event.text.as_str())).collect();
        assert_eq!(order, [(100, "first"), (300, "second"), (500, "third")]);
    }

    #[test]
    fn equal_starts_keep_their_order() {
        let mut document = SubtitleDocument::with_events(vec![
            Event::dialogue(200, 300, "b"),
            Event::dialogue(100, 300, "a1"),
            Event::dialogue(100, 200, "a2"),
            Event::dialogue(100, 150, "a3"),
        ]);
        sort_events(&mut document);

        let texts: Vec<&str> = document.events.iter().map(|event| event.text.as_str()).collect();
        assert_eq!(texts, ["a1", "a2", "a3", "b"]);
    }
}
