//! Everything that talks to the ffmpeg and ffprobe executables.

pub mod args;
pub mod progress;
pub mod supervisor;

use std::{
    collections::HashMap,
    ffi::OsString,
    path::{Path, PathBuf},
    sync::{atomic::AtomicBool, Arc},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::debug;

pub use self::{
    progress::{Progress, ProgressKey},
    supervisor::{FfmpegError, Invocation, ProgressStream, ToolOutput, DEFAULT_ACCEPT_TIMEOUT},
};

/// Options passed to every ffmpeg invocation. `-y` is safe because outputs are
/// only ever written inside a render's scratch directory.
pub const DEFAULT_GLOBAL_ARGS: [&str; 3] = ["-hide_banner", "-nostdin", "-y"];
pub const DEFAULT_PROBE_GLOBAL_ARGS: [&str; 1] = ["-hide_banner"];

/// Locations of the tools and how they are invoked.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    pub ffmpeg:            PathBuf,
    pub ffprobe:           PathBuf,
    pub global_args:       Vec<OsString>,
    pub probe_global_args: Vec<OsString>,
    pub accept_timeout:    Duration,
    /// Stops any running tool once set.
    pub interrupt:         Option<Arc<AtomicBool>>,
}

impl Default for Ffmpeg {
    #[inline]
    fn default() -> Self {
        Self {
            ffmpeg:            PathBuf::from("ffmpeg"),
            ffprobe:           PathBuf::from("ffprobe"),
            global_args:       DEFAULT_GLOBAL_ARGS.iter().map(OsString::from).collect(),
            probe_global_args: DEFAULT_PROBE_GLOBAL_ARGS.iter().map(OsString::from).collect(),
            accept_timeout:    DEFAULT_ACCEPT_TIMEOUT,
            interrupt:         None,
        }
    }
}

impl Ffmpeg {
    /// Checks that both executables can be found.
    #[inline]
    pub fn validate(&self) -> Result<()> {
        for tool in [&self.ffmpeg, &self.ffprobe] {
            if which::which(tool).is_err() {
                bail!(FfmpegError::ToolNotFound {
                    name: tool.display().to_string(),
                });
            }
        }

        Ok(())
    }

    #[inline]
    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    #[inline]
    pub fn invocation(&self, args: Vec<OsString>) -> Invocation {
        Invocation {
            program:        self.ffmpeg.clone(),
            global_args:    self.global_args.clone(),
            args,
            accept_timeout: self.accept_timeout,
            interrupt:      self.interrupt.clone(),
        }
    }

    #[inline]
    pub fn probe_invocation(&self, args: Vec<OsString>) -> Invocation {
        Invocation {
            interrupt: self.interrupt.clone(),
            ..Invocation::new(&self.ffprobe, args).with_global_args(self.probe_global_args.iter().cloned())
        }
    }

    #[inline]
    pub fn run(&self, args: Vec<OsString>) -> Result<ToolOutput, FfmpegError> {
        self.invocation(args).run()
    }

    /// Runs ffmpeg while following its output position in microseconds.
    #[inline]
    pub fn run_with_progress(&self, args: Vec<OsString>) -> Result<ProgressStream<u64>, FfmpegError> {
        self.invocation(args).spawn(Some(ProgressKey::out_time_us()))
    }

    /// Fails when ffprobe cannot read `video`.
    #[inline]
    pub fn validate_video(&self, video: &Path) -> Result<()> {
        self.probe_invocation(vec!["-v".into(), "error".into(), video.as_os_str().to_owned()])
            .run()
            .with_context(|| format!("{} is not a readable video", video.display()))?;

        Ok(())
    }

    #[inline]
    pub fn probe(&self, video: &Path) -> Result<Probe> {
        let output = self
            .probe_invocation(args::probe_streams(video))
            .run()
            .with_context(|| format!("Failed to probe {}", video.display()))?;

        serde_json::from_str(&output.stdout.to_string_lossy()).with_context(|| {
            FfmpegError::UnexpectedOutput {
                program: self.ffprobe.display().to_string(),
                reason:  "stream listing is not valid JSON".to_owned(),
            }
        })
    }

    /// Returns the `index`-th subtitle stream of `video` as ASS text.
    #[inline]
    pub fn extract_subtitles(&self, video: &Path, index: usize) -> Result<String> {
        debug!("extracting subtitle stream {index} of {}", video.display());
        let output = self
            .run(args::extract_subtitle_stream(video, index))
            .with_context(|| format!("Failed to extract subtitles from {}", video.display()))?;

        Ok(output.stdout.to_string_lossy().into_owned())
    }
}

/// Stream listing printed by `ffprobe -show_streams`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Probe {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeStream {
    #[serde(default)]
    pub index:      usize,
    #[serde(default)]
    pub codec_type: Option<String>,
    #[serde(default)]
    pub tags:       HashMap<String, String>,
}

impl ProbeStream {
    #[inline]
    pub fn is_subtitle(&self) -> bool {
        self.codec_type.as_deref() == Some("subtitle")
    }

    #[inline]
    pub fn language(&self) -> Option<&str> {
        self.tags.get("language").map(String::as_str)
    }
}

impl Probe {
    #[inline]
    pub fn subtitle_streams(&self) -> impl Iterator<Item = &ProbeStream> {
        self.streams.iter().filter(|stream| stream.is_subtitle())
    }

    /// Position among the subtitle streams (as used by `-map 0:s:N`) of the
    /// first one tagged with `language`.
    #[inline]
    pub fn subtitle_index_for(&self, language: &str) -> Option<usize> {
        self.subtitle_streams().position(|stream| stream.language() == Some(language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE: &str = r#"{
        "streams": [
            { "index": 0, "codec_type": "video", "tags": { "language": "eng" } },
            { "index": 1, "codec_type": "audio", "tags": { "language": "jpn" } },
            { "index": 2, "codec_type": "subtitle", "tags": { "language": "jpn", "title": "Signs" } },
            { "index": 3, "codec_type": "subtitle" },
            { "index": 4, "codec_type": "subtitle", "tags": { "language": "eng" } }
        ]
    }"#;

    #[test]
    fn subtitle_index_ignores_other_streams() {
        let probe: Probe = serde_json::from_str(PROBE).unwrap();
        assert_eq!(probe.subtitle_streams().count(), 3);
        assert_eq!(probe.subtitle_index_for("jpn"), Some(0));
        assert_eq!(probe.subtitle_index_for("eng"), Some(2));
        assert_eq!(probe.subtitle_index_for("fre"), None);
    }

    #[test]
    fn empty_probe() {
        let probe: Probe = serde_json::from_str("{}").unwrap();
        assert_eq!(probe.subtitle_streams().count(), 0);
    }

    #[test]
    fn unknown_tools_are_reported() {
        let tools = Ffmpeg {
            ffmpeg: PathBuf::from("definitely-not-ffmpeg-3f9a"),
            ..Ffmpeg::default()
        };
        let error = tools.validate().unwrap_err();
        assert!(matches!(
            error.downcast_ref::<FfmpegError>(),
            Some(FfmpegError::ToolNotFound { name }) if name == "definitely-not-ffmpeg-3f9a"
        ));
    }

    #[test]
    fn invocation_uses_global_args() {
        let invocation = Ffmpeg::default().invocation(vec!["-i".into(), "a.mkv".into()]);
        assert_eq!(invocation.program, Path::new("ffmpeg"));
        assert_eq!(invocation.global_args, ["-hide_banner", "-nostdin", "-y"]);
        assert_eq!(invocation.args.len(), 2);
        assert!(invocation.interrupt.is_none());
    }

    #[test]
    fn interrupt_reaches_every_invocation() {
        let flag = Arc::new(AtomicBool::new(false));
        let tools = Ffmpeg::default().with_interrupt(Arc::clone(&flag));

        let invocation = tools.invocation(Vec::new());
        assert!(invocation.interrupt.is_some_and(|interrupt| Arc::ptr_eq(&interrupt, &flag)));
        let probe = tools.probe_invocation(Vec::new());
        assert!(probe.interrupt.is_some_and(|interrupt| Arc::ptr_eq(&interrupt, &flag)));
    }
}
