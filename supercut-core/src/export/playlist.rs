use anyhow::Result;
use itertools::Itertools;

use super::parts;
use crate::cuts::Cut;

/// Extended M3U playlist that makes VLC play only the cut ranges, optionally
/// with the subtitle track of `language` selected.
#[inline]
pub fn write_playlist(cuts: &[Cut], language: Option<&str>) -> Result<String> {
    let mut lines = parts(cuts)?.into_iter().flat_map(|part| {
        let mut lines = vec![
            format!("#EXTVLCOPT:start-time={}", seconds(part.start_ms)),
            format!("#EXTVLCOPT:stop-time={}", seconds(part.end_ms)),
        ];
        if let Some(language) = language {
            lines.push(format!("#EXTVLCOPT:sub-language={language}"));
        }
        lines.push(part.video.display().to_string());
        lines
    });

    Ok(lines.join("\n"))
}

fn seconds(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::cuts;

    #[test]
    fn lists_ranges_in_seconds() {
        let playlist = write_playlist(&cuts(&[("/v/a.mkv", 1500, 3000), ("/v/b.mkv", 0, 250)]), None).unwrap();
        assert_eq!(
            playlist,
            "#EXTVLCOPT:start-time=1.5\n#EXTVLCOPT:stop-time=3\n/v/a.mkv\n#EXTVLCOPT:start-time=0\n#EXTVLCOPT:stop-time=0.25\n/v/b.mkv"
        );
    }

    #[test]
    fn selects_subtitle_language() {
        let playlist = write_playlist(&cuts(&[("/v/a.mkv", 0, 1000)]), Some("jpn")).unwrap();
        assert!(playlist.contains("#EXTVLCOPT:sub-language=jpn\n/v/a.mkv"));
    }

    #[test]
    fn paths_are_absolute() {
        let playlist = write_playlist(&cuts(&[("relative.mkv", 0, 1000)]), None).unwrap();
        let path = playlist.lines().last().unwrap();
        assert!(std::path::Path::new(path).is_absolute());
        assert!(path.ends_with("relative.mkv"));
    }
}
