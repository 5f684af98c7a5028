//! Plain-text edit lists: one numbered line per cut, which the user can
//! reorder, duplicate or delete before rendering.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use itertools::Itertools;
use thiserror::Error;

use crate::cuts::Cut;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditListError {
    #[error("Line {line}: expected an index, found {content:?}")]
    InvalidLine { line: usize, content: String },
    #[error("Line {line}: index {index} is out of range, there are {available} cuts")]
    IndexOutOfRange {
        line:      usize,
        index:     usize,
        available: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditList {
    /// Selected indices with the line each came from.
    entries: Vec<(usize, usize)>,
}

impl EditList {
    /// One `index | speaker: text` line per cut.
    #[inline]
    pub fn render(cuts: &[Cut]) -> String {
        let mut text = cuts
            .iter()
            .enumerate()
            .map(|(index, cut)| format!("{index:>4} | {}", cut.describe()))
            .join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        text
    }

    /// Blank lines and lines starting with `#` are ignored. Every other line
    /// must start with an index.
    #[inline]
    pub fn parse(text: &str) -> Result<Self, EditListError> {
        let mut entries = Vec::new();

        for (number, line) in text.lines().enumerate() {
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let token = line.split_whitespace().next().unwrap_or_default();
            let index = token.parse().map_err(|_| EditListError::InvalidLine {
                line:    number + 1,
                content: line.to_owned(),
            })?;
            entries.push((index, number + 1));
        }

        Ok(Self {
            entries,
        })
    }

    #[inline]
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("Failed to read edit list {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid edit list {}", path.display()))
    }

    #[inline]
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|&(index, _)| index)
    }

    /// Picks `items` in edit list order.
    #[inline]
    pub fn apply<T: Clone>(&self, items: &[T]) -> Result<Vec<T>, EditListError> {
        self.entries
            .iter()
            .map(|&(index, line)| {
                items.get(index).cloned().ok_or(EditListError::IndexOutOfRange {
                    line,
                    index,
                    available: items.len(),
                })
            })
            .collect()
    }
}
