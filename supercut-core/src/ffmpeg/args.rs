//! Argument vectors for each ffmpeg operation of the pipeline.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

fn path(path: &Path) -> OsString {
    path.as_os_str().to_owned()
}

/// Cuts `[start_ms, start_ms + duration_ms)` out of `source`, re-basing video
/// and audio timestamps to zero.
#[inline]
pub fn trim(source: &Path, start_ms: u64, duration_ms: u64, output: &Path) -> Vec<OsString> {
    let filter = format!(
        "[0:v]trim=0:{duration_ms}ms,setpts=PTS-STARTPTS[video];[0:a]atrim=0:{duration_ms}ms,asetpts=PTS-STARTPTS[audio]"
    );
    vec![
        "-ss".into(),
        format!("{start_ms}ms").into(),
        "-i".into(),
        path(source),
        "-filter_complex".into(),
        filter.into(),
        "-map".into(),
        "[video]".into(),
        "-map".into(),
        "[audio]".into(),
        path(output),
    ]
}

/// Adds `subtitles` as the default subtitle stream without re-encoding.
#[inline]
pub fn attach_subtitles(clip: &Path, subtitles: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-i".into(),
        path(clip),
        "-i".into(),
        path(subtitles),
        "-c".into(),
        "copy".into(),
        "-disposition:s:0".into(),
        "default".into(),
        path(output),
    ]
}

/// Demuxer-level concatenation of the files listed in `manifest`.
#[inline]
pub fn concat(manifest: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        path(manifest),
        "-map".into(),
        "0".into(),
        "-c".into(),
        "copy".into(),
        path(output),
    ]
}

/// Copies audio and video of `video` and replaces its subtitles with
/// `subtitles`, marked as default.
#[inline]
pub fn replace_subtitles(video: &Path, subtitles: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-i".into(),
        path(video),
        "-i".into(),
        path(subtitles),
        "-map".into(),
        "0:v".into(),
        "-map".into(),
        "0:a".into(),
        "-map".into(),
        "1".into(),
        "-c".into(),
        "copy".into(),
        "-disposition:s:0".into(),
        "default".into(),
        path(output),
    ]
}

/// Writes the `index`-th subtitle stream of `video` to stdout as ASS.
#[inline]
pub fn extract_subtitle_stream(video: &Path, index: usize) -> Vec<OsString> {
    vec![
        "-v".into(),
        "error".into(),
        "-i".into(),
        path(video),
        "-map".into(),
        format!("0:s:{index}").into(),
        "-f".into(),
        "ass".into(),
        "-".into(),
    ]
}

#[inline]
pub fn probe_streams(video: &Path) -> Vec<OsString> {
    vec![
        "-v".into(),
        "error".into(),
        "-print_format".into(),
        "json".into(),
        "-show_streams".into(),
        path(video),
    ]
}

/// Concat demuxer list. Paths must already be absolute, and single quotes
/// are escaped the way the demuxer expects.
#[inline]
pub fn concat_manifest(videos: &[PathBuf]) -> String {
    videos
        .iter()
        .map(|video| format!("file '{}'", video.to_string_lossy().replace('\'', r"'\''")))
        .fold(String::new(), |mut manifest, line| {
            manifest.push_str(&line);
            manifest.push('\n');
            manifest
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn trim_rebases_both_streams() {
        let args = strings(&trim(Path::new("in.mkv"), 1000, 3000, Path::new("trim0000.mkv")));
        assert_eq!(args[..4], ["-ss", "1000ms", "-i", "in.mkv"]);
        assert_eq!(
            args[5],
            "[0:v]trim=0:3000ms,setpts=PTS-STARTPTS[video];[0:a]atrim=0:3000ms,asetpts=PTS-STARTPTS[audio]"
        );
        assert_eq!(args.last().unwrap(), "trim0000.mkv");
    }

    #[test]
    fn repair_maps_new_subtitles() {
        let args = strings(&replace_subtitles(
            Path::new("dirty.mkv"),
            Path::new("repaired.ass"),
            Path::new("final.mkv"),
        ));
        assert_eq!(
            args,
            [
                "-i",
                "dirty.mkv",
                "-i",
                "repaired.ass",
                "-map",
                "0:v",
                "-map",
                "0:a",
                "-map",
                "1",
                "-c",
                "copy",
                "-disposition:s:0",
                "default",
                "final.mkv"
            ]
        );
    }

    #[test]
    fn manifest_keeps_order_and_escapes_quotes() {
        let manifest = concat_manifest(&[
            PathBuf::from("/tmp/withsubs0000.mkv"),
            PathBuf::from("/tmp/it's here/withsubs0001.mkv"),
        ]);
        assert_eq!(
            manifest,
            "file '/tmp/withsubs0000.mkv'\nfile '/tmp/it'\\''s here/withsubs0001.mkv'\n"
        );
    }
}
