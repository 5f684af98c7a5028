//! Previewing cut lists in VLC.

use std::{
    env,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::debug;

use crate::util::printable_command;

/// Overrides which VLC binary is used.
pub const VLC_ENV_VAR: &str = "SUPERCUT_VLC_PATH";
pub const WINDOWS_DEFAULT_PATH: &str = r"C:\Program Files\VideoLAN\VLC\vlc.exe";

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Could not run {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source:  std::io::Error,
    },
    #[error("{command} exited with {status}")]
    Failed { command: String, status: std::process::ExitStatus },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    program: PathBuf,
}

impl Player {
    /// An explicit `program` wins over the environment, then the default
    /// install location on Windows, then `vlc` on `PATH`.
    #[inline]
    pub fn resolve(program: Option<&Path>) -> Self {
        let program = program
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(VLC_ENV_VAR).filter(|value| !value.is_empty()).map(PathBuf::from))
            .or_else(|| {
                let default = Path::new(WINDOWS_DEFAULT_PATH);
                (cfg!(windows) && default.is_file()).then(|| default.to_path_buf())
            })
            .unwrap_or_else(|| PathBuf::from("vlc"));

        Self {
            program,
        }
    }

    #[inline]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Starts and immediately quits VLC without an interface.
    #[inline]
    pub fn ensure(&self) -> Result<(), PlayerError> {
        self.run(["-I", "dummy", "vlc://quit"].map(OsString::from).to_vec(), true)
    }

    /// Plays an extended M3U `playlist` fullscreen and exits when it ends.
    #[inline]
    pub fn view(&self, playlist: &str) -> Result<()> {
        let dir = tempfile::Builder::new()
            .prefix("supercut-preview-")
            .tempdir()
            .with_context(|| "Failed to create a directory for the playlist")?;
        let file = dir.path().join("playlist.m3u8");
        fs::write(&file, playlist).with_context(|| format!("Failed to write {}", file.display()))?;

        self.run(
            vec![
                "--fullscreen".into(),
                "--no-osd".into(),
                file.into_os_string(),
                "vlc://quit".into(),
            ],
            false,
        )?;

        Ok(())
    }

    fn run(&self, args: Vec<OsString>, quiet: bool) -> Result<(), PlayerError> {
        let command = printable_command(self.program.as_os_str(), &args);
        debug!("running {command}");

        let mut cmd = Command::new(&self.program);
        cmd.args(&args).stdin(Stdio::null());
        if quiet {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let status = cmd.status().map_err(|source| PlayerError::Launch {
            program: self.program.display().to_string(),
            source,
        })?;
        if !status.success() {
            return Err(PlayerError::Failed {
                command,
                status,
            });
        }

        Ok(())
    }
}
