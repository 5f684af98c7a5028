//! Rendering an ordered segment list into one subtitled video.
//!
//! Every segment is trimmed out of its source and gets its own subtitles
//! attached, the clips are concatenated in list order, and the merged
//! subtitle track is sorted. All intermediate files live in a scratch
//! directory that is removed however the render ends.

use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::{bail, ensure, Context, Result};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    ffmpeg::{args, Ffmpeg, ProgressStream},
    progress_bar::{ProgressReporter, Stage},
    segment::Segment,
    subtitle::repair::repair_subtitles,
    util::to_absolute_path,
};

/// Extension the scratch files get when the output has none.
const FALLBACK_EXTENSION: &str = "mkv";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Nothing to render: no segments were selected")]
    EmptySegmentList,
    #[error("{} already exists", path.display())]
    OutputExists { path: PathBuf },
    #[error("Source video {} does not exist", path.display())]
    MissingSource { path: PathBuf },
    #[error("{} has no subtitle stream", path.display())]
    MissingSubtitleStream { path: PathBuf },
    #[error("Render was cancelled")]
    Cancelled,
}

/// Cumulative progress of one stage across all segments, in microseconds.
///
/// Positions reported by ffmpeg for the current clip are capped at the clip's
/// duration and added to the durations of the clips already done, so the
/// reported position never goes backwards and never passes the total.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    total:     u64,
    completed: u64,
    reported:  u64,
}

impl BatchProgress {
    #[inline]
    pub fn new(total: u64) -> Self {
        Self {
            total,
            completed: 0,
            reported: 0,
        }
    }

    /// New overall position, if `clip_position` moved it forward.
    #[inline]
    pub fn observe(&mut self, clip_position: u64, clip_duration: u64) -> Option<u64> {
        let position = self.completed.saturating_add(clip_position.min(clip_duration)).min(self.total);
        self.advance_to(position)
    }

    /// Marks the current clip as done.
    #[inline]
    pub fn complete(&mut self, clip_duration: u64) -> Option<u64> {
        self.completed = self.completed.saturating_add(clip_duration).min(self.total);
        self.advance_to(self.completed)
    }

    fn advance_to(&mut self, position: u64) -> Option<u64> {
        (position > self.reported).then(|| {
            self.reported = position;
            position
        })
    }
}

pub struct Renderer<'a> {
    ffmpeg:       Ffmpeg,
    progress:     &'a dyn ProgressReporter,
    cancelled:    Arc<AtomicBool>,
    overwrite:    bool,
    scratch_root: Option<PathBuf>,
}

impl<'a> Renderer<'a> {
    #[inline]
    pub fn new(ffmpeg: &Ffmpeg, progress: &'a dyn ProgressReporter) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        Self {
            ffmpeg: ffmpeg.clone().with_interrupt(Arc::clone(&cancelled)),
            progress,
            cancelled,
            overwrite: false,
            scratch_root: None,
        }
    }

    /// Flag that aborts the render once set. A running tool is killed
    /// within a fraction of a second.
    #[inline]
    pub fn with_cancellation(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.ffmpeg.interrupt = Some(Arc::clone(&cancelled));
        self.cancelled = cancelled;
        self
    }

    #[inline]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Where scratch directories are created instead of the system temp dir.
    #[inline]
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    /// Renders `segments`, in order, into `output`. On failure `output` is left
    /// as it was.
    #[tracing::instrument(skip_all, fields(segments = segments.len(), output = %output.display()))]
    #[inline]
    pub fn render(&self, segments: &[Segment], output: &Path) -> Result<()> {
        self.validate(segments, output)?;

        let mut builder = tempfile::Builder::new();
        builder.prefix("supercut-");
        let scratch = match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .with_context(|| "Failed to create scratch directory")?;
        debug!("scratch directory {}", scratch.path().display());

        let extension = output
            .extension()
            .map_or_else(|| FALLBACK_EXTENSION.to_owned(), |extension| extension.to_string_lossy().into_owned());
        let result = self.render_in(segments, output, scratch.path(), &extension);

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            warn!("failed to remove scratch directory {}: {e}", scratch_path.display());
        }

        if result.is_ok() {
            info!("wrote {}", output.display());
        }
        result
    }

    fn validate(&self, segments: &[Segment], output: &Path) -> Result<()> {
        if segments.is_empty() {
            bail!(RenderError::EmptySegmentList);
        }
        if output.exists() && !self.overwrite {
            bail!(RenderError::OutputExists {
                path: output.to_path_buf(),
            });
        }
        if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            ensure!(parent.is_dir(), "Output directory {} does not exist", parent.display());
        }
        if let Some(segment) = segments.iter().find(|segment| !segment.source().is_file()) {
            bail!(RenderError::MissingSource {
                path: segment.source().to_path_buf(),
            });
        }

        Ok(())
    }

    fn render_in(&self, segments: &[Segment], output: &Path, scratch: &Path, extension: &str) -> Result<()> {
        let total_us = segments.iter().map(Segment::duration_us).sum();

        info!("extracting {} video parts", segments.len());
        self.progress.begin(Stage::Trim, total_us);
        let mut progress = BatchProgress::new(total_us);
        let mut clips = Vec::with_capacity(segments.len());
        for (index, segment) in segments.iter().enumerate() {
            self.check_cancelled()?;
            let trimmed = scratch.join(format!("trim{index:04}.{extension}"));
            let stream = self.ffmpeg.run_with_progress(args::trim(
                segment.source(),
                segment.start_ms(),
                segment.duration_ms(),
                &trimmed,
            ))?;
            self.follow(stream, |position| progress.observe(position, segment.duration_us()))?;
            self.report(progress.complete(segment.duration_us()));

            clips.push(self.attach_subtitles(index, segment, &trimmed, scratch, extension)?);
        }
        self.progress.finish();

        self.check_cancelled()?;
        info!("concatenating {} video parts", clips.len());
        let manifest = scratch.join("concat.txt");
        fs::write(&manifest, args::concat_manifest(&clips))
            .with_context(|| format!("Failed to write {}", manifest.display()))?;
        let dirty = scratch.join(format!("dirty.{extension}"));
        self.progress.begin(Stage::Concatenate, total_us);
        let mut progress = BatchProgress::new(total_us);
        let stream = self.ffmpeg.run_with_progress(args::concat(&manifest, &dirty))?;
        self.follow(stream, |position| progress.observe(position, total_us))?;
        self.report(progress.complete(total_us));
        self.progress.finish();

        self.check_cancelled()?;
        info!("sorting subtitles");
        let repaired = scratch.join(format!("final.{extension}"));
        repair_subtitles(&self.ffmpeg, &dirty, scratch, &repaired)?;

        self.check_cancelled()?;
        place_output(&repaired, output)
    }

    /// Attaches the segment's subtitles to its trimmed clip, returning the
    /// absolute path of the result.
    fn attach_subtitles(
        &self,
        index: usize,
        segment: &Segment,
        clip: &Path,
        scratch: &Path,
        extension: &str,
    ) -> Result<PathBuf> {
        let subtitles = scratch.join(format!("subs{index:04}.ass"));
        fs::write(&subtitles, segment.subtitles())
            .with_context(|| format!("Failed to write {}", subtitles.display()))?;

        self.ffmpeg.validate_video(clip)?;
        let with_subs = scratch.join(format!("withsubs{index:04}.{extension}"));
        self.ffmpeg.run(args::attach_subtitles(clip, &subtitles, &with_subs))?;

        to_absolute_path(&with_subs)
    }

    /// Consumes a progress stream. Returning early drops the stream, which
    /// stops the tool.
    fn follow(&self, stream: ProgressStream<u64>, mut observe: impl FnMut(u64) -> Option<u64>) -> Result<()> {
        for item in stream {
            let progress = match item {
                Ok(progress) => progress,
                // an interrupted tool fails on its own, report why it was interrupted
                Err(_) if self.is_cancelled() => bail!(RenderError::Cancelled),
                Err(e) => return Err(e.into()),
            };
            self.report(observe(progress.value));
            self.check_cancelled()?;
        }

        self.check_cancelled()
    }

    fn report(&self, position: Option<u64>) {
        if let Some(position) = position {
            self.progress.update(position);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            bail!(RenderError::Cancelled);
        }
        Ok(())
    }
}

/// Moves the finished file into place. Across filesystems it is copied next to
/// `output` first and renamed, so `output` never holds a partial file.
fn place_output(artifact: &Path, output: &Path) -> Result<()> {
    if fs::rename(artifact, output).is_ok() {
        return Ok(());
    }

    let dir = output.parent().filter(|parent| !parent.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let mut partial = tempfile::Builder::new()
        .prefix(".supercut-")
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create a file in {}", dir.display()))?;
    let mut source = File::open(artifact).with_context(|| format!("Failed to open {}", artifact.display()))?;
    io::copy(&mut source, partial.as_file_mut()).with_context(|| format!("Failed to copy to {}", output.display()))?;
    partial
        .persist(output)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to move output to {}", output.display()))?;

    Ok(())
}
