//! Cut lists in formats other programs understand.

pub mod edl;
pub mod mlt;
pub mod playlist;

use std::path::PathBuf;

use anyhow::Result;

pub use self::{edl::write_edl, mlt::write_mlt, playlist::write_playlist};
use crate::{cuts::Cut, util::to_absolute_path};

/// A cut with a resolved source path and a range that is never negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Part {
    pub video:    PathBuf,
    pub start_ms: u64,
    pub end_ms:   u64,
}

impl Part {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

pub(crate) fn parts(cuts: &[Cut]) -> Result<Vec<Part>> {
    cuts.iter()
        .map(|cut| {
            Ok(Part {
                video:    to_absolute_path(&cut.video)?,
                start_ms: u64::try_from(cut.start_ms).unwrap_or(0),
                end_ms:   u64::try_from(cut.end_ms).unwrap_or(0),
            })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{path::Path, sync::Arc};

    use crate::{
        cuts::{cuts_in, Criteria, Cut},
        subtitle::{Event, SubtitleDocument},
    };

    /// One cut per `(video, start_ms, end_ms)`, all matching "x".
    pub fn cuts(ranges: &[(&str, i64, i64)]) -> Vec<Cut> {
        let criteria = Criteria {
            query:    "x",
            name:     None,
            language: "eng",
        };
        ranges
            .iter()
            .flat_map(|&(video, start, end)| {
                let document = Arc::new(SubtitleDocument::with_events(vec![Event::dialogue(start, end, "x")]));
                cuts_in(Path::new(video), &document, &criteria)
            })
            .collect()
    }
}
