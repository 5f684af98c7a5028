//! Subtitle documents and the transforms the pipeline applies to them.

pub mod ass;
pub mod external;
pub mod query;
pub mod repair;
pub mod srt;
pub mod timeline;

use std::{borrow::Cow, collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result};
use thiserror::Error;

pub use self::{query::query_events, timeline::clip_to};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum EventKind {
    Dialogue,
    Comment,
}

/// One subtitle line. Times are milliseconds relative to the document's zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind:   EventKind,
    pub start:  i64,
    pub end:    i64,
    /// Speaker, from the `Name` (or older `Actor`) column.
    pub name:   String,
    pub text:   String,
    /// The remaining `Format:` columns (`Layer`, `Style`, margins...) by name.
    pub fields: BTreeMap<String, String>,
}

impl Event {
    #[inline]
    pub fn dialogue(start: i64, end: i64, text: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Dialogue,
            start,
            end,
            name: String::new(),
            text: text.into(),
            fields: ass::default_fields(),
        }
    }

    #[inline]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[inline]
    pub fn duration(&self) -> i64 {
        self.end - self.start
    }

    #[inline]
    pub fn is_comment(&self) -> bool {
        self.kind == EventKind::Comment
    }

    /// Text with override blocks removed and ASS escapes turned into their
    /// plain equivalents.
    #[inline]
    pub fn plain_text(&self) -> String {
        let mut plain = String::with_capacity(self.text.len());
        let mut in_override = false;
        let mut chars = self.text.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if !in_override => in_override = true,
                '}' if in_override => in_override = false,
                _ if in_override => {},
                '\\' => match chars.peek() {
                    Some('N' | 'n') => {
                        chars.next();
                        plain.push('\n');
                    },
                    Some('h') => {
                        chars.next();
                        plain.push(' ');
                    },
                    _ => plain.push(c),
                },
                _ => plain.push(c),
            }
        }

        plain
    }

    /// Value of `column` as written out in an ASS `Dialogue:` line.
    fn column(&self, column: &str) -> Cow<'_, str> {
        match column.to_ascii_lowercase().as_str() {
            "start" => Cow::Owned(ass::format_timestamp(self.start)),
            "end" => Cow::Owned(ass::format_timestamp(self.end)),
            "name" | "actor" => Cow::Borrowed(&self.name),
            "text" => Cow::Borrowed(&self.text),
            lowered => match self.fields.get(column) {
                Some(value) => Cow::Borrowed(value),
                None => Cow::Borrowed(match lowered {
                    "style" => "Default",
                    "layer" | "marked" | "marginl" | "marginr" | "marginv" => "0",
                    _ => "",
                }),
            },
        }
    }
}

/// A non-event section, kept line for line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name:  String,
    pub lines: Vec<String>,
}

/// An Advanced SubStation Alpha document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleDocument {
    /// Every section except `[Events]`, in file order.
    pub sections:     Vec<Section>,
    /// Column names of the `[Events]` `Format:` line.
    pub event_format: Vec<String>,
    pub events:       Vec<Event>,
}

impl Default for SubtitleDocument {
    #[inline]
    fn default() -> Self {
        Self::with_events(Vec::new())
    }
}

impl SubtitleDocument {
    /// A document with the default script header and styles.
    #[inline]
    pub fn with_events(events: Vec<Event>) -> Self {
        Self {
            sections: ass::default_sections(),
            event_format: ass::default_event_format(),
            events,
        }
    }

    /// Same header, different events.
    #[inline]
    pub fn with_replaced_events(&self, events: Vec<Event>) -> Self {
        Self {
            sections: self.sections.clone(),
            event_format: self.event_format.clone(),
            events,
        }
    }

    /// Loads an `.srt` or ASS/SSA file, picking the codec by extension.
    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("Failed to read subtitles {}", path.display()))?;
        let is_srt = path.extension().is_some_and(|extension| extension.eq_ignore_ascii_case("srt"));
        let document = if is_srt {
            Self::parse_srt(&text)
        } else {
            Self::parse_ass(&text)
        };

        document.with_context(|| format!("Failed to parse subtitles {}", path.display()))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubtitleError {
    #[error("Line {line}: invalid timestamp {value:?}")]
    InvalidTimestamp { line: usize, value: String },
    #[error("Line {line}: expected {expected} fields in event {content:?}")]
    MalformedEvent {
        line:     usize,
        expected: usize,
        content:  String,
    },
    #[error("Line {line}: subtitle block has no timing line")]
    MissingTiming { line: usize },
}
