use anyhow::{bail, Result};
use colored::Colorize;
use supercut_core::player::VLC_ENV_VAR;
use tracing::debug;

use super::Session;

/// Reports every missing tool with a hint where to get it.
pub fn check_handler(session: &Session) -> Result<()> {
    let mut missing = 0;

    if let Err(e) = session.configuration.ffmpeg().validate() {
        debug!("{e:#}");
        eprintln!(
            "{}\nFor installation, see https://ffmpeg.org/",
            "Could not find ffmpeg or ffprobe in PATH.".red()
        );
        missing += 1;
    }

    let player = session.player();
    if let Err(e) = player.ensure() {
        debug!("{e}");
        eprintln!(
            "{}\nFor installation, see https://www.videolan.org/",
            format!("Could not find vlc in PATH or {VLC_ENV_VAR} variable.").red()
        );
        missing += 1;
    }

    if missing > 0 {
        bail!("{missing} required tool(s) missing");
    }

    println!("{}", "All good!".green());
    Ok(())
}
