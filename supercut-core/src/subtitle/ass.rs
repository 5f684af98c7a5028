//! Advanced SubStation Alpha reader and writer.

use std::collections::BTreeMap;

use itertools::Itertools;
use nom::{
    bytes::complete::take_till1,
    character::complete::{char, digit1, one_of},
    combinator::{eof, map_opt, map_res, rest},
    sequence::{delimited, separated_pair, terminated},
    IResult,
    Parser,
};

use crate::subtitle::{Event, EventKind, Section, SubtitleDocument, SubtitleError};

const EVENTS_SECTION: &str = "Events";

const DEFAULT_EVENT_FORMAT: [&str; 10] = [
    "Layer", "Start", "End", "Style", "Name", "MarginL", "MarginR", "MarginV", "Effect", "Text",
];

#[inline]
pub fn default_event_format() -> Vec<String> {
    DEFAULT_EVENT_FORMAT.iter().map(|column| (*column).to_owned()).collect()
}

/// Column values of a fresh dialogue line in the default format.
#[inline]
pub fn default_fields() -> BTreeMap<String, String> {
    [
        ("Layer", "0"),
        ("Style", "Default"),
        ("MarginL", "0"),
        ("MarginR", "0"),
        ("MarginV", "0"),
        ("Effect", ""),
    ]
    .into_iter()
    .map(|(column, value)| (column.to_owned(), value.to_owned()))
    .collect()
}

/// Script header and a single `Default` style.
#[inline]
pub fn default_sections() -> Vec<Section> {
    vec![
        Section {
            name:  "Script Info".to_owned(),
            lines: [
                "; Script generated by supercut",
                "ScriptType: v4.00+",
                "WrapStyle: 0",
                "ScaledBorderAndShadow: yes",
                "Collisions: Normal",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
        },
        Section {
            name:  "V4+ Styles".to_owned(),
            lines: [
                "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, \
                 Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, \
                 Alignment, MarginL, MarginR, MarginV, Encoding",
                "Style: Default,Arial,20.0,&H00FFFFFF,&H000000FF,&H00000000,&H00000000,0,0,0,0,100.0,100.0,0.0,0.0,1,\
                 2.0,2.0,2,10,10,10,1",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
        },
    ]
}

fn number(input: &str) -> IResult<&str, i64> {
    map_res(digit1, str::parse::<i64>).parse(input)
}

/// `H:MM:SS.cc`. The fraction may have any number of digits; it is truncated
/// to milliseconds. Times that do not fit in an `i64` fail to parse.
pub(crate) fn timestamp(input: &str) -> IResult<&str, i64> {
    map_opt(
        (terminated(number, char(':')), terminated(number, char(':')), number, one_of(".,"), digit1),
        |(hours, minutes, seconds, _, fraction)| to_millis(hours, minutes, seconds, fraction),
    )
    .parse(input)
}

fn to_millis(hours: i64, minutes: i64, seconds: i64, fraction: &str) -> Option<i64> {
    let millis = fraction
        .chars()
        .chain(std::iter::repeat('0'))
        .take(3)
        .fold(0, |acc, digit| acc * 10 + i64::from(digit.to_digit(10).unwrap_or(0)));

    hours
        .checked_mul(60)?
        .checked_add(minutes)?
        .checked_mul(60)?
        .checked_add(seconds)?
        .checked_mul(1000)?
        .checked_add(millis)
}

fn parse_timestamp(value: &str) -> Option<i64> {
    terminated(timestamp, eof).parse(value.trim()).ok().map(|(_, ms)| ms)
}

/// Centisecond timestamp, rounded to the nearest centisecond. ASS has no
/// negative times, so those become zero.
#[inline]
pub fn format_timestamp(ms: i64) -> String {
    let centis = ms.max(0).saturating_add(5) / 10;
    format!(
        "{}:{:02}:{:02}.{:02}",
        centis / 360_000,
        centis / 6000 % 60,
        centis / 100 % 60,
        centis % 100
    )
}

/// `[Name]`
fn section_header(line: &str) -> Option<&str> {
    delimited(char::<&str, nom::error::Error<&str>>('['), take_till1(|c| c == ']'), char(']'))
        .parse(line)
        .ok()
        .filter(|(rest, _)| rest.is_empty())
        .map(|(_, name)| name)
}

/// `Key: value`
fn descriptor(line: &str) -> Option<(&str, &str)> {
    separated_pair(take_till1(|c| c == ':'), char::<&str, nom::error::Error<&str>>(':'), rest)
        .parse(line)
        .ok()
        .map(|(_, (key, value))| (key.trim(), value.trim_start()))
}

fn parse_event(kind: EventKind, value: &str, format: &[String], line: usize) -> Result<Event, SubtitleError> {
    let values: Vec<&str> = value.splitn(format.len(), ',').collect();
    if values.len() != format.len() {
        return Err(SubtitleError::MalformedEvent {
            line,
            expected: format.len(),
            content: value.to_owned(),
        });
    }

    let mut event = Event {
        kind,
        start: 0,
        end: 0,
        name: String::new(),
        text: String::new(),
        fields: BTreeMap::new(),
    };

    for (column, value) in format.iter().zip(values) {
        match column.to_ascii_lowercase().as_str() {
            "start" | "end" => {
                let ms = parse_timestamp(value).ok_or_else(|| SubtitleError::InvalidTimestamp {
                    line,
                    value: value.to_owned(),
                })?;
                if column.eq_ignore_ascii_case("start") {
                    event.start = ms;
                } else {
                    event.end = ms;
                }
            },
            "name" | "actor" => event.name = value.trim().to_owned(),
            "text" => event.text = value.to_owned(),
            _ => {
                event.fields.insert(column.clone(), value.trim().to_owned());
            },
        }
    }

    Ok(event)
}

impl SubtitleDocument {
    #[inline]
    pub fn parse_ass(text: &str) -> Result<Self, SubtitleError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut sections = Vec::new();
        let mut current: Option<Section> = None;
        let mut in_events = false;
        let mut event_format: Option<Vec<String>> = None;
        let mut events = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();

            if let Some(name) = section_header(line) {
                sections.extend(current.take());
                in_events = name.eq_ignore_ascii_case(EVENTS_SECTION);
                if !in_events {
                    current = Some(Section {
                        name:  name.to_owned(),
                        lines: Vec::new(),
                    });
                }
                continue;
            }

            if in_events {
                match descriptor(line) {
                    Some(("Format", columns)) => {
                        event_format = Some(columns.split(',').map(|column| column.trim().to_owned()).collect());
                    },
                    Some((kind @ ("Dialogue" | "Comment"), value)) => {
                        let kind = if kind == "Dialogue" {
                            EventKind::Dialogue
                        } else {
                            EventKind::Comment
                        };
                        let format = event_format.get_or_insert_with(default_event_format);
                        events.push(parse_event(kind, value, format, index + 1)?);
                    },
                    // blank lines, and event types nothing here plays (Picture, Sound...)
                    _ => {},
                }
            } else if let Some(section) = current.as_mut() {
                if !line.is_empty() {
                    section.lines.push(raw.trim_end().to_owned());
                }
            }
        }
        sections.extend(current.take());

        Ok(Self {
            sections,
            event_format: event_format.unwrap_or_else(default_event_format),
            events,
        })
    }

    #[inline]
    pub fn to_ass_string(&self) -> String {
        let mut lines = Vec::new();

        for section in &self.sections {
            lines.push(format!("[{}]", section.name));
            lines.extend(section.lines.iter().cloned());
            lines.push(String::new());
        }

        lines.push(format!("[{EVENTS_SECTION}]"));
        lines.push(format!("Format: {}", self.event_format.join(", ")));
        for event in &self.events {
            let values = self.event_format.iter().map(|column| event.column(column)).join(",");
            lines.push(format!("{}: {values}", event.kind));
        }

        let mut text = lines.join("\n");
        text.push('\n');
        text
    }
}
