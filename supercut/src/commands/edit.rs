//! Edit lists: pick, drop and reorder matches by hand before rendering.
//!
//! An edit list only stores indices into the match list, so every edit
//! command has to be given the same videos, query and speaker the list was
//! created with.

use std::path::Path;

use anyhow::{Context, Result};
use supercut_core::{edit_list::EditList, export::write_playlist, Cut};
use tracing::info;

use super::{write_output, EditCommands, SearchArgs, Session};

pub fn edit_handler(session: &Session, subcommand: &EditCommands) -> Result<()> {
    match subcommand {
        EditCommands::Create {
            search,
            listfile,
        } => {
            let cuts = session.find(search, &search.videos)?;
            let text = EditList::render(&cuts);
            write_output(listfile.as_deref(), &text)
        },
        EditCommands::Preview {
            search,
            listfile,
        } => {
            let cuts = selected_cuts(session, search, listfile)?;
            let playlist = write_playlist(&cuts, Some(session.language(&search.library)))?;
            session.player().view(&playlist)
        },
        EditCommands::Render {
            search,
            listfile,
            output,
        } => {
            let cuts = selected_cuts(session, search, listfile)?;
            session.render(&cuts, output)?;
            println!("Supercut written to {}", output.output.display());
            Ok(())
        },
    }
}

/// The matches named by `listfile`, in its order.
pub fn selected_cuts(session: &Session, search: &SearchArgs, listfile: &Path) -> Result<Vec<Cut>> {
    let list = EditList::from_file(listfile)?;
    let cuts = session.find(search, &search.videos)?;
    let selected = list
        .apply(&cuts)
        .with_context(|| format!("{} does not match the current search", listfile.display()))?;
    info!("{} of {} lines selected", selected.len(), cuts.len());

    Ok(selected)
}
