use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use path_abs::PathAbs;

/// Resolves `path` against the current directory without touching the
/// filesystem beyond what is needed to read it.
#[inline]
pub fn to_absolute_path(path: &Path) -> Result<PathBuf> {
    let absolute = PathAbs::new(path)
        .with_context(|| format!("Failed to resolve absolute path of {}", path.display()))?;
    Ok(AsRef::<Path>::as_ref(&absolute).to_path_buf())
}

/// Joins a command line into a single shell-quoted string for logging.
#[inline]
pub fn printable_command<I, S>(program: &OsStr, args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let words: Vec<String> = std::iter::once(program.to_string_lossy().into_owned())
        .chain(args.into_iter().map(|arg| arg.as_ref().to_string_lossy().into_owned()))
        .collect();
    shlex::try_join(words.iter().map(String::as_str)).unwrap_or_else(|_| words.join(" "))
}
