pub mod check;
pub mod edit;
pub mod export;
pub mod search;

use std::{
    path::{Path, PathBuf},
    sync::{atomic::AtomicBool, Arc},
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use supercut_core::{
    cuts::find_cuts,
    progress_bar::TerminalProgress,
    Criteria,
    Cut,
    Renderer,
    SubtitleLibrary,
};
use tracing::info;

use crate::{configuration::Configuration, DEFAULT_CONFIG_PATH};

/// Subtitle-based automatic supercut generator
#[derive(Parser, Debug)]
#[command(name = "supercut", version, about, long_about = None)]
pub struct SupercutCli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file, ignored when it does not exist
    #[arg(long = "config", global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config_file: PathBuf,

    /// Also write a debug log to this file
    #[arg(long, global = true)]
    pub logs: Option<PathBuf>,

    /// Print debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a supercut of every matching line
    Render {
        #[command(flatten)]
        search: SearchArgs,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Quick preview of the matching lines in VLC
    Preview {
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Show all lines that match the query and speaker
    List {
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Show all speaker names in the subtitles
    Names {
        /// The videos to search
        #[arg(required = true)]
        videos: Vec<PathBuf>,

        /// Only count lines containing this text
        #[arg(short, long, default_value = "")]
        query: String,

        #[command(flatten)]
        library: LibraryArgs,
    },
    /// Editable supercuts
    Edit {
        #[command(subcommand)]
        subcommand: EditCommands,
    },
    /// Write the matching lines as a project for a video editor
    Export {
        #[arg(value_enum)]
        format: ExportFormat,

        #[command(flatten)]
        search: SearchArgs,

        /// Edit list selecting and ordering the lines
        #[arg(long)]
        listfile: Option<PathBuf>,

        /// File to write, defaults to stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Title of the edit decision list
        #[arg(long, default_value = "Supercut")]
        title: String,
    },
    /// Ensure ffmpeg, ffprobe and VLC can be run
    Check,
    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum EditCommands {
    /// Create an edit list of the matching lines
    Create {
        #[command(flatten)]
        search: SearchArgs,

        /// List file to create, defaults to stdout
        #[arg(long)]
        listfile: Option<PathBuf>,
    },
    /// Preview the lines of an edit list in VLC
    Preview {
        #[command(flatten)]
        search: SearchArgs,

        /// Edit list to load
        #[arg(long)]
        listfile: PathBuf,
    },
    /// Render the lines of an edit list, in its order
    Render {
        #[command(flatten)]
        search: SearchArgs,

        /// Edit list to load
        #[arg(long)]
        listfile: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// CMX3600 edit decision list
    Edl,
    /// Shotcut project
    Mlt,
}

/// Where subtitles come from.
#[derive(Args, Debug, Clone)]
pub struct LibraryArgs {
    /// Subtitle language to use [default: eng]
    #[arg(long)]
    pub language: Option<String>,

    /// Cache directory location. Speeds up repeated runs
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Read `.srt` files next to the videos instead of embedded subtitles
    #[arg(long)]
    pub external_subs: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// The videos to supercut, in order
    #[arg(required = true)]
    pub videos: Vec<PathBuf>,

    /// Text to search for in the subtitles
    #[arg(short, long)]
    pub query: String,

    /// Only lines spoken by this speaker
    #[arg(short, long)]
    pub name: Option<String>,

    #[command(flatten)]
    pub library: LibraryArgs,
}

#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Output file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Replace the output file if it exists
    #[arg(long)]
    pub overwrite: bool,
}

/// Everything a command needs besides its own arguments.
pub struct Session {
    pub configuration: Configuration,
    pub cancelled:     Arc<AtomicBool>,
}

impl Session {
    pub fn open_library(&self, args: &LibraryArgs) -> Result<SubtitleLibrary> {
        let ffmpeg = self.configuration.ffmpeg();
        if !args.external_subs && !self.configuration.external_subs {
            ffmpeg.validate()?;
        }

        SubtitleLibrary::open(
            ffmpeg,
            self.configuration.cache_dir(args.cache_dir.as_deref()),
            args.external_subs || self.configuration.external_subs,
        )
    }

    pub fn language<'a>(&'a self, args: &'a LibraryArgs) -> &'a str {
        self.configuration.language(args.language.as_deref())
    }

    /// Matching lines across `videos`, in video order.
    #[tracing::instrument(skip_all, fields(query = %search.query))]
    pub fn find(&self, search: &SearchArgs, videos: &[PathBuf]) -> Result<Vec<Cut>> {
        let library = self.open_library(&search.library)?;
        let criteria = Criteria {
            query:    &search.query,
            name:     search.name.as_deref(),
            language: self.language(&search.library),
        };

        let cuts = find_cuts(&library, videos, &criteria);
        library.close()?;
        cuts
    }

    pub fn render(&self, cuts: &[Cut], output: &OutputArgs) -> Result<()> {
        let segments = supercut_core::cuts::build_segments(cuts)?;
        info!("rendering {} parts into {}", segments.len(), output.output.display());

        let ffmpeg = self.configuration.ffmpeg();
        ffmpeg.validate()?;
        let progress = TerminalProgress::new();
        Renderer::new(&ffmpeg, &progress)
            .with_cancellation(Arc::clone(&self.cancelled))
            .with_overwrite(output.overwrite || self.configuration.overwrite)
            .render(&segments, &output.output)
    }

    pub fn player(&self) -> supercut_core::player::Player {
        supercut_core::player::Player::resolve(self.configuration.vlc.as_deref())
    }
}

/// Writes `text` to `output`, or stdout without one.
pub fn write_output(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("wrote {}", path.display());
        },
        None => {
            print!("{text}");
            if !text.ends_with('\n') {
                println!();
            }
        },
    }
    Ok(())
}
