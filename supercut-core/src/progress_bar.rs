use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};

/// Pipeline stages that report progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Stage {
    #[strum(to_string = "Extracting video parts")]
    Trim,
    #[strum(to_string = "Concatenating video parts")]
    Concatenate,
}

/// Receives progress of the render in microseconds of output.
pub trait ProgressReporter: Send + Sync {
    fn begin(&self, stage: Stage, total_us: u64);
    /// `completed_us` never decreases within a stage.
    fn update(&self, completed_us: u64);
    fn finish(&self);
}

/// Reports nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    #[inline]
    fn begin(&self, _stage: Stage, _total_us: u64) {}

    #[inline]
    fn update(&self, _completed_us: u64) {}

    #[inline]
    fn finish(&self) {}
}

const TEMPLATE: &str = "{prefix} - {elapsed} {wide_bar} ({percent:.2}%) {eta}";

/// One terminal progress bar per stage.
#[derive(Debug, Default)]
pub struct TerminalProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl TerminalProgress {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_bar(&self, f: impl FnOnce(&mut Option<ProgressBar>)) {
        // a poisoned bar only means a panic elsewhere, drawing can go on
        let mut guard = self.bar.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard);
    }
}

impl ProgressReporter for TerminalProgress {
    #[inline]
    fn begin(&self, stage: Stage, total_us: u64) {
        let bar = ProgressBar::new(total_us);
        bar.set_style(ProgressStyle::default_bar().template(TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_bar()));
        bar.set_prefix(stage.to_string());

        self.with_bar(|current| {
            if let Some(previous) = current.replace(bar) {
                previous.finish_and_clear();
            }
        });
    }

    #[inline]
    fn update(&self, completed_us: u64) {
        self.with_bar(|current| {
            if let Some(bar) = current {
                bar.set_position(completed_us);
            }
        });
    }

    #[inline]
    fn finish(&self) {
        self.with_bar(|current| {
            if let Some(bar) = current.take() {
                bar.finish();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_labels() {
        assert_eq!(Stage::Trim.to_string(), "Extracting video parts");
        assert_eq!(Stage::Concatenate.to_string(), "Concatenating video parts");
    }

    #[test]
    fn template_is_valid() {
        assert!(ProgressStyle::default_bar().template(TEMPLATE).is_ok());
    }

    #[test]
    fn terminal_progress_tracks_one_bar_per_stage() {
        let progress = TerminalProgress::new();
        progress.begin(Stage::Trim, 100);
        progress.update(40);
        progress.with_bar(|bar| assert_eq!(bar.as_ref().map(ProgressBar::position), Some(40)));

        progress.begin(Stage::Concatenate, 10);
        progress.with_bar(|bar| assert_eq!(bar.as_ref().map(|bar| bar.length()), Some(Some(10))));

        progress.finish();
        progress.with_bar(|bar| assert!(bar.is_none()));
    }
}
