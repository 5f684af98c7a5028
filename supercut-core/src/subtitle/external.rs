//! Finding SubRip files that ship next to a video instead of inside it.

use std::{
    fs,
    path::{Path, PathBuf},
};

const SUBS_DIR: &str = "Subs";
const SDH_MARKER: &str = "[SDH]";

fn is_sdh(path: &Path) -> bool {
    path.to_string_lossy().contains(SDH_MARKER)
}

/// `<video dir>/Subs/*.<language>.srt`, preferring files not marked `[SDH]`.
fn find_in_subs_dir(video: &Path, language: &str) -> Option<PathBuf> {
    let subs_dir = video.parent().unwrap_or_else(|| Path::new(".")).join(SUBS_DIR);
    let suffix = format!(".{language}.srt");

    let mut candidates: Vec<PathBuf> = fs::read_dir(subs_dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.file_name().is_some_and(|name| name.to_string_lossy().ends_with(&suffix)))
        .collect();
    candidates.sort_by_key(|path| (is_sdh(path), path.clone()));

    candidates.into_iter().next()
}

/// Subtitle file for `video` in `language`: the `Subs` directory first, then a
/// `.srt` with the same stem.
#[inline]
pub fn find_srt_for(video: &Path, language: &str) -> Option<PathBuf> {
    find_in_subs_dir(video, language).or_else(|| {
        let beside = video.with_extension("srt");
        beside.is_file().then_some(beside)
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn prefers_subs_dir_without_sdh() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("episode.mkv");
        touch(&dir.path().join("Subs/2_English [SDH].eng.srt"));
        touch(&dir.path().join("Subs/3_English.eng.srt"));
        touch(&dir.path().join("Subs/4_French.fre.srt"));
        touch(&dir.path().join("episode.srt"));

        assert_eq!(find_srt_for(&video, "eng"), Some(dir.path().join("Subs/3_English.eng.srt")));
        assert_eq!(find_srt_for(&video, "fre"), Some(dir.path().join("Subs/4_French.fre.srt")));
    }

    #[test]
    fn falls_back_to_sdh_then_sibling() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("episode.mkv");
        touch(&dir.path().join("Subs/English [SDH].eng.srt"));
        assert_eq!(find_srt_for(&video, "eng"), Some(dir.path().join("Subs/English [SDH].eng.srt")));

        touch(&dir.path().join("episode.srt"));
        assert_eq!(find_srt_for(&video, "jpn"), Some(dir.path().join("episode.srt")));
        assert_eq!(find_srt_for(&dir.path().join("other.mkv"), "jpn"), None);
    }
}
