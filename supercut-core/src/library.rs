//! Per-video subtitle tracks, extracted once and kept on disk.

use std::{
    fs,
    io::Write,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
    thread::available_parallelism,
    time::UNIX_EPOCH,
};

use anyhow::{anyhow, bail, Context, Result};
use sha2::{Digest, Sha256};
use tempfile::{NamedTempFile, TempDir};
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    ffmpeg::Ffmpeg,
    subtitle::{external::find_srt_for, SubtitleDocument},
    util::to_absolute_path,
};

const RAW_SUBS_DIR: &str = "raw_subs";

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("{video} has no {language} subtitle stream")]
    NoSuchLanguage { video: String, language: String },
    #[error("No {language} subtitle file found for {video}")]
    NoExternalSubtitles { video: String, language: String },
    #[error("{0} does not exist")]
    MissingVideo(String),
}

#[derive(Debug)]
enum CacheDir {
    Persistent(PathBuf),
    Temporary(TempDir),
}

impl CacheDir {
    fn path(&self) -> &Path {
        match self {
            Self::Persistent(path) => path,
            Self::Temporary(dir) => dir.path(),
        }
    }
}

/// Source of subtitle documents for videos.
///
/// Embedded tracks are extracted with ffmpeg and memoized under the cache
/// directory. Entries are written atomically, so several libraries (or
/// processes) may share one directory. In external mode SubRip files next
/// to the videos are read instead.
#[derive(Debug)]
pub struct SubtitleLibrary {
    ffmpeg:        Ffmpeg,
    cache:         CacheDir,
    external_subs: bool,
}

impl SubtitleLibrary {
    /// Without a `cache_dir` a private temporary directory is used and removed
    /// again by [`SubtitleLibrary::close`].
    #[inline]
    pub fn open(ffmpeg: Ffmpeg, cache_dir: Option<&Path>, external_subs: bool) -> Result<Self> {
        let cache = match cache_dir {
            Some(path) => CacheDir::Persistent(path.to_path_buf()),
            None => CacheDir::Temporary(
                tempfile::Builder::new()
                    .prefix("supercut-cache-")
                    .tempdir()
                    .with_context(|| "Failed to create temporary subtitle cache")?,
            ),
        };

        let raw_subs = cache.path().join(RAW_SUBS_DIR);
        fs::create_dir_all(&raw_subs)
            .with_context(|| format!("Failed to create cache directory {}", raw_subs.display()))?;
        debug!("subtitle cache at {}", cache.path().display());

        Ok(Self {
            ffmpeg,
            cache,
            external_subs,
        })
    }

    #[inline]
    pub fn cache_dir(&self) -> &Path {
        self.cache.path()
    }

    #[inline]
    pub fn ffmpeg(&self) -> &Ffmpeg {
        &self.ffmpeg
    }

    /// Ends the library's lifetime, removing a temporary cache.
    #[inline]
    pub fn close(self) -> Result<()> {
        match self.cache {
            CacheDir::Temporary(dir) => dir.close().with_context(|| "Failed to remove temporary subtitle cache"),
            CacheDir::Persistent(_) => Ok(()),
        }
    }

    #[inline]
    pub fn get(&self, video: &Path, language: &str) -> Result<SubtitleDocument> {
        if !video.is_file() {
            bail!(LibraryError::MissingVideo(video.display().to_string()));
        }

        if self.external_subs {
            let Some(path) = find_srt_for(video, language) else {
                bail!(LibraryError::NoExternalSubtitles {
                    video:    video.display().to_string(),
                    language: language.to_owned(),
                });
            };
            debug!("using {} for {}", path.display(), video.display());
            return SubtitleDocument::load(&path);
        }

        let raw = self.embedded(video, language)?;
        SubtitleDocument::parse_ass(&raw).with_context(|| format!("Subtitles of {} are unreadable", video.display()))
    }

    /// Fetches documents for all `videos` concurrently. Results are in input
    /// order.
    #[inline]
    pub fn get_many(&self, videos: &[PathBuf], language: &str) -> Result<Vec<Arc<SubtitleDocument>>> {
        let workers = available_parallelism().map_or(4, NonZeroUsize::get);
        let mut documents = Vec::with_capacity(videos.len());

        for batch in videos.chunks(workers) {
            let results = crossbeam_utils::thread::scope(|s| {
                let handles: Vec<_> = batch
                    .iter()
                    .map(|video| s.spawn(move |_| self.get(video, language)))
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| handle.join().map_err(|_| anyhow!("Subtitle extraction thread panicked")))
                    .collect::<Vec<_>>()
            })
            .map_err(|_| anyhow!("Subtitle extraction thread panicked"))?;

            for result in results {
                documents.push(Arc::new(result??));
            }
        }

        Ok(documents)
    }

    /// Raw ASS text of the `language` track embedded in `video`.
    fn embedded(&self, video: &Path, language: &str) -> Result<String> {
        let entry = self.cache.path().join(RAW_SUBS_DIR).join(format!("{}.ass", cache_key(video, language)?));

        match fs::read_to_string(&entry) {
            Ok(raw) => {
                trace!("cache hit for {} ({language})", video.display());
                return Ok(raw);
            },
            Err(e) => trace!("cache miss for {} ({language}): {e}", video.display()),
        }

        let probe = self.ffmpeg.probe(video)?;
        let Some(index) = probe.subtitle_index_for(language) else {
            bail!(LibraryError::NoSuchLanguage {
                video:    video.display().to_string(),
                language: language.to_owned(),
            });
        };
        let raw = self.ffmpeg.extract_subtitles(video, index)?;

        store(&entry, &raw)?;
        Ok(raw)
    }
}

/// Writes `contents` to a sibling temporary file and renames it into place, so
/// readers see either nothing or the whole entry.
fn store(entry: &Path, contents: &str) -> Result<()> {
    let dir = entry.parent().unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir).with_context(|| format!("Failed to create a file in {}", dir.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("Failed to write cache entry {}", entry.display()))?;

    if let Err(e) = file.persist(entry) {
        // another writer finished the same entry first
        if !entry.is_file() {
            return Err(e.error).with_context(|| format!("Failed to store cache entry {}", entry.display()));
        }
    }

    Ok(())
}

/// Identifies one track of one version of a video file.
#[inline]
pub fn cache_key(video: &Path, language: &str) -> Result<String> {
    let absolute = to_absolute_path(video)?;
    let metadata = fs::metadata(&absolute).with_context(|| format!("Failed to read metadata of {}", video.display()))?;
    let modified = metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |since| since.as_nanos());

    let mut hasher = Sha256::new();
    hasher.update(absolute.as_os_str().as_encoded_bytes());
    hasher.update([0_u8]);
    hasher.update(metadata.len().to_le_bytes());
    hasher.update(modified.to_le_bytes());
    hasher.update(language.as_bytes());

    Ok(format!("{:x}", hasher.finalize()))
}
