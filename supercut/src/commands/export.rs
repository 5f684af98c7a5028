use std::path::Path;

use anyhow::Result;
use supercut_core::export::{write_edl, write_mlt};

use super::{edit::selected_cuts, write_output, ExportFormat, SearchArgs, Session};

pub fn export_handler(
    session: &Session,
    format: ExportFormat,
    search: &SearchArgs,
    listfile: Option<&Path>,
    output: Option<&Path>,
    title: &str,
) -> Result<()> {
    let cuts = match listfile {
        Some(listfile) => selected_cuts(session, search, listfile)?,
        None => session.find(search, &search.videos)?,
    };

    let project = match format {
        ExportFormat::Edl => write_edl(title, &cuts)?,
        ExportFormat::Mlt => write_mlt(&cuts)?,
    };
    write_output(output, &project)
}
