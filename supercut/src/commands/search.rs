//! Commands that work on every matching line.

use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;
use supercut_core::{
    edit_list::EditList,
    export::write_playlist,
    subtitle::{query::speaker_counts, query_events},
};
use tracing::info;

use super::{LibraryArgs, OutputArgs, SearchArgs, Session};

#[tracing::instrument(skip_all)]
pub fn render_handler(session: &Session, search: &SearchArgs, output: &OutputArgs) -> Result<()> {
    let cuts = session.find(search, &search.videos)?;
    session.render(&cuts, output)?;
    println!("{} {}", "Supercut written to".green(), output.output.display());
    Ok(())
}

/// Plays the matches in VLC, videos in name order.
#[tracing::instrument(skip_all)]
pub fn preview_handler(session: &Session, search: &SearchArgs) -> Result<()> {
    let mut videos = search.videos.clone();
    videos.sort();

    let cuts = session.find(search, &videos)?;
    info!("previewing {} lines", cuts.len());
    let playlist = write_playlist(&cuts, Some(session.language(&search.library)))?;
    session.player().view(&playlist)
}

/// Prints the matches in edit list form.
pub fn list_handler(session: &Session, search: &SearchArgs) -> Result<()> {
    let cuts = session.find(search, &search.videos)?;
    print!("{}", EditList::render(&cuts));
    Ok(())
}

/// Prints how many matching lines each speaker has.
pub fn names_handler(session: &Session, videos: &[PathBuf], query: &str, library_args: &LibraryArgs) -> Result<()> {
    let library = session.open_library(library_args)?;
    let documents = library.get_many(videos, session.language(library_args));
    library.close()?;

    let documents = documents?;
    let events = documents.iter().flat_map(|document| query_events(document, query, None));
    print!("{}", names_table(&speaker_counts(events)));
    Ok(())
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}

fn names_table(counts: &[(String, usize)]) -> String {
    let rows: Vec<(String, String)> =
        counts.iter().map(|(name, count)| (capitalize(name), count.to_string())).collect();
    let name_width = rows.iter().map(|(name, _)| name.chars().count()).chain([4]).max().unwrap_or(4);
    let count_width = rows.iter().map(|(_, count)| count.len()).chain([5]).max().unwrap_or(5);

    let mut lines = vec![
        format!(
            "{} {}",
            format!("{:<name_width$}", "Name").bold(),
            format!("{:>count_width$}", "Count").bold()
        ),
        format!("{} {}", "-".repeat(name_width), "-".repeat(count_width)),
    ];
    lines.extend(rows.iter().map(|(name, count)| format!("{name:<name_width$} {count:>count_width$}")));

    let mut table = lines.join("\n");
    table.push('\n');
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_capitalized() {
        assert_eq!(capitalize("ALICE"), "Alice");
        assert_eq!(capitalize("bob smith"), "Bob smith");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn table_keeps_count_order() {
        colored::control::set_override(false);
        let table = names_table(&[("bob".to_owned(), 12), ("alice".to_owned(), 3)]);
        assert_eq!(table, "Name  Count\n----- -----\nBob      12\nAlice     3\n");
    }
}
