//! Shotcut (MLT XML) projects.
//!
//! Every playlist entry needs its own `chain` producer, even when two entries
//! share a video. Each distinct video additionally gets one chain in the main
//! bin so it shows up in Shotcut's playlist panel.

use std::{borrow::Cow, collections::HashSet, path::Path};

use anyhow::Result;

use super::parts;
use crate::cuts::Cut;

const MLT_VERSION: &str = "7.23.0";
const TITLE: &str = "Supercut";
const INDENT: &str = "  ";

/// `HH:MM:SS.mmm`
fn timecode(ms: u64) -> String {
    let seconds = ms / 1000;
    format!("{:02}:{:02}:{:02}.{:03}", seconds / 3600, (seconds / 60) % 60, seconds % 60, ms % 1000)
}

fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }

    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

#[derive(Debug)]
enum Content {
    Empty,
    Text(String),
    Children(Vec<Element>),
}

#[derive(Debug)]
struct Element {
    tag:        &'static str,
    attributes: Vec<(&'static str, String)>,
    content:    Content,
}

impl Element {
    fn new(tag: &'static str) -> Self {
        Self {
            tag,
            attributes: Vec::new(),
            content: Content::Empty,
        }
    }

    fn attribute(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attributes.push((name, value.into()));
        self
    }

    fn text(mut self, text: impl Into<String>) -> Self {
        self.content = Content::Text(text.into());
        self
    }

    fn children(mut self, children: Vec<Element>) -> Self {
        self.content = Content::Children(children);
        self
    }

    fn property(name: &'static str, value: impl Into<String>) -> Self {
        Self::new("property").attribute("name", name).text(value)
    }

    fn chain(id: String, video: &Path) -> Self {
        Self::new("chain")
            .attribute("id", id)
            .children(vec![Self::property("resource", video.display().to_string())])
    }

    fn write(&self, depth: usize, out: &mut Vec<String>) {
        let indent = INDENT.repeat(depth);
        let mut open = format!("{indent}<{}", self.tag);
        for (name, value) in &self.attributes {
            open.push(' ');
            open.push_str(name);
            open.push_str("=\"");
            open.push_str(&escape(value));
            open.push('"');
        }

        match &self.content {
            Content::Empty => out.push(format!("{open}/>")),
            Content::Text(text) => out.push(format!("{open}>{}</{}>", escape(text), self.tag)),
            Content::Children(children) => {
                out.push(format!("{open}>"));
                for child in children {
                    child.write(depth + 1, out);
                }
                out.push(format!("{indent}</{}>", self.tag));
            },
        }
    }
}

#[inline]
pub fn write_mlt(cuts: &[Cut]) -> Result<String> {
    let parts = parts(cuts)?;

    let mut chains = Vec::new();
    let mut entries = Vec::new();
    let mut main_bin = vec![Element::property("xml_retain", "1")];
    let mut seen = HashSet::new();
    for (index, part) in parts.iter().enumerate() {
        let chain_id = format!("chain{index}");
        chains.push(Element::chain(chain_id.clone(), &part.video));

        if seen.insert(part.video.as_path()) {
            let bin_id = format!("main_bin_chain{index}");
            chains.push(Element::chain(bin_id.clone(), &part.video));
            main_bin.push(Element::new("entry").attribute("producer", bin_id));
        }

        entries.push(
            Element::new("entry")
                .attribute("producer", chain_id)
                .attribute("in", timecode(part.start_ms))
                .attribute("out", timecode(part.end_ms)),
        );
    }

    let total_ms = parts.iter().map(super::Part::duration_ms).sum();
    let tractor = Element::new("tractor")
        .attribute("id", "tractor1")
        .attribute("title", TITLE)
        .attribute("in", timecode(0))
        .attribute("out", timecode(total_ms))
        .children(vec![
            Element::property("shotcut", "1"),
            Element::property("shotcut:projectAudioChannels", "2"),
            Element::property("shotcut:projectFolder", "1"),
            Element::new("track").attribute("producer", "background"),
            Element::new("track").attribute("producer", "playlist0"),
        ]);

    let mut children = chains;
    children.extend([
        Element::new("playlist").attribute("id", "main_bin").children(main_bin),
        Element::new("playlist").attribute("id", "background"),
        Element::new("playlist").attribute("id", "playlist0").children(entries),
        tractor,
    ]);
    let mlt = Element::new("mlt")
        .attribute("LC_NUMERIC", "C")
        .attribute("version", MLT_VERSION)
        .attribute("title", TITLE)
        .attribute("producer", "main_bin")
        .children(children);

    let mut lines = vec![r#"<?xml version="1.0" standalone="no"?>"#.to_owned()];
    mlt.write(0, &mut lines);
    Ok(lines.join("\n"))
}
