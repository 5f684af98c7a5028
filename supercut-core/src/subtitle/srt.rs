//! SubRip import, for subtitle files shipped beside a video.

use nom::{
    bytes::complete::tag,
    character::complete::{digit1, space0},
    combinator::all_consuming,
    sequence::delimited,
    Parser,
};

use crate::subtitle::{ass::timestamp, Event, SubtitleDocument, SubtitleError};

const MARKUP: [(&str, &str); 12] = [
    ("<i>", r"{\i1}"),
    ("</i>", r"{\i0}"),
    ("<b>", r"{\b1}"),
    ("</b>", r"{\b0}"),
    ("<u>", r"{\u1}"),
    ("</u>", r"{\u0}"),
    ("<I>", r"{\i1}"),
    ("</I>", r"{\i0}"),
    ("<B>", r"{\b1}"),
    ("</B>", r"{\b0}"),
    ("<U>", r"{\u1}"),
    ("</U>", r"{\u0}"),
];

/// `00:00:01,000 --> 00:00:02,500`, possibly followed by position hints.
fn timing(line: &str) -> Option<(i64, i64)> {
    (timestamp, delimited(space0, tag("-->"), space0), timestamp)
        .parse(line.trim())
        .ok()
        .map(|(_, (start, _, end))| (start, end))
}

fn is_counter(line: &str) -> bool {
    all_consuming(digit1::<&str, nom::error::Error<&str>>).parse(line.trim()).is_ok()
}

fn to_ass_markup(lines: &[&str]) -> String {
    let mut text = lines.join(r"\N");
    for (html, ass) in MARKUP {
        text = text.replace(html, ass);
    }
    text
}

impl SubtitleDocument {
    /// Builds a document with the default header from SubRip text.
    #[inline]
    pub fn parse_srt(text: &str) -> Result<Self, SubtitleError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut lines = text.lines().enumerate().peekable();
        let mut events = Vec::new();

        loop {
            while lines.next_if(|(_, line)| line.trim().is_empty()).is_some() {}
            let Some((index, mut line)) = lines.next() else {
                break;
            };

            let mut line_number = index + 1;
            if is_counter(line) {
                (line_number, line) = match lines.next() {
                    Some((index, line)) => (index + 1, line),
                    None => {
                        return Err(SubtitleError::MissingTiming {
                            line: line_number,
                        })
                    },
                };
            }

            let (start, end) = timing(line).ok_or_else(|| SubtitleError::InvalidTimestamp {
                line:  line_number,
                value: line.trim().to_owned(),
            })?;

            let mut text_lines = Vec::new();
            while let Some((_, line)) = lines.next_if(|(_, line)| !line.trim().is_empty()) {
                text_lines.push(line.trim_end());
            }

            events.push(Event::dialogue(start, end, to_ass_markup(&text_lines)));
        }

        Ok(Self::with_events(events))
    }
}
