//! Line protocol written by `ffmpeg -progress <url>`.
//!
//! Every tick is a run of `key=value` lines closed by a `progress=continue`
//! line, or `progress=end` for the last one.

use std::{collections::HashMap, fmt::Debug};

/// Key holding the output position in microseconds.
pub const OUT_TIME_US: &str = "out_time_us";
const PROGRESS_KEY: &[u8] = b"progress";
const END_MARKER: &[u8] = b"end";
/// Placeholder ffmpeg writes before a value is known.
const NOT_AVAILABLE: &[u8] = b"N/A";

/// Every key/value pair reported during one progress period.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProgressTick {
    values:   HashMap<Vec<u8>, Vec<u8>>,
    finished: bool,
}

impl ProgressTick {
    #[inline]
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.values.get(key.as_bytes()).map(Vec::as_slice)
    }

    /// Whether this was the `progress=end` tick.
    #[inline]
    pub fn is_final(&self) -> bool {
        self.finished
    }
}

/// Groups raw lines into [`ProgressTick`]s.
#[derive(Debug, Default)]
pub struct TickParser {
    pending: HashMap<Vec<u8>, Vec<u8>>,
}

impl TickParser {
    /// Feeds one line (with or without its terminator). Returns a tick when the
    /// line closes one.
    #[inline]
    pub fn push_line(&mut self, line: &[u8]) -> Option<ProgressTick> {
        let (key, value) = split_record(line)?;

        if key == PROGRESS_KEY {
            return Some(ProgressTick {
                values:   std::mem::take(&mut self.pending),
                finished: value == END_MARKER,
            });
        }

        self.pending.insert(key.to_vec(), value.to_vec());
        None
    }
}

fn split_record(line: &[u8]) -> Option<(&[u8], &[u8])> {
    let separator = line.iter().position(|&b| b == b'=')?;
    let key = line[..separator].trim_ascii();
    if key.is_empty() {
        return None;
    }
    Some((key, line[separator + 1..].trim_ascii()))
}

/// Value extracted from one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress<T> {
    pub value:    T,
    /// Set on the tick that ffmpeg marked as the last one.
    pub finished: bool,
}

type Converter<T> = Box<dyn Fn(&[u8]) -> Option<T> + Send>;

/// Which key to follow in the progress stream and how to turn its raw value
/// into something useful.
pub struct ProgressKey<T> {
    key:       String,
    converter: Converter<T>,
}

impl<T> ProgressKey<T> {
    #[inline]
    pub fn new(key: impl Into<String>, converter: impl Fn(&[u8]) -> Option<T> + Send + 'static) -> Self {
        Self {
            key:       key.into(),
            converter: Box::new(converter),
        }
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// `None` when the tick lacks the key, the value is `N/A`, or the converter
    /// rejects it.
    #[inline]
    pub fn extract(&self, tick: &ProgressTick) -> Option<Progress<T>> {
        let raw = tick.get(&self.key)?;
        if raw == NOT_AVAILABLE {
            return None;
        }
        Some(Progress {
            value:    (self.converter)(raw)?,
            finished: tick.is_final(),
        })
    }
}

impl ProgressKey<u64> {
    /// Output position in microseconds, the usual way to follow an encode.
    #[inline]
    pub fn out_time_us() -> Self {
        Self::new(OUT_TIME_US, parse_u64)
    }
}

impl<T> Debug for ProgressKey<T> {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressKey").field("key", &self.key).finish_non_exhaustive()
    }
}

/// Parses a non-negative decimal. ffmpeg reports negative positions while
/// priming, and those are skipped.
#[inline]
pub fn parse_u64(raw: &[u8]) -> Option<u64> {
    simdutf8::basic::from_utf8(raw).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(parser: &mut TickParser, text: &str) -> Vec<ProgressTick> {
        text.lines().filter_map(|line| parser.push_line(line.as_bytes())).collect()
    }

    #[test]
    fn groups_lines_into_ticks() {
        let mut parser = TickParser::default();
        let ticks = feed(
            &mut parser,
            "frame=10\nout_time_us=400000\nprogress=continue\nframe=20\nout_time_us=800000\nprogress=end\n",
        );

        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].get("frame"), Some(&b"10"[..]));
        assert_eq!(ticks[0].get(OUT_TIME_US), Some(&b"400000"[..]));
        assert!(!ticks[0].is_final());
        assert_eq!(ticks[1].get("frame"), Some(&b"20"[..]));
        assert!(ticks[1].is_final());
    }

    #[test]
    fn keys_do_not_leak_between_ticks() {
        let mut parser = TickParser::default();
        let ticks = feed(&mut parser, "speed=1x\nprogress=continue\nprogress=continue\n");
        assert_eq!(ticks[0].get("speed"), Some(&b"1x"[..]));
        assert_eq!(ticks[1].get("speed"), None);
    }

    #[test]
    fn tolerates_whitespace_and_carriage_returns() {
        let mut parser = TickParser::default();
        assert_eq!(parser.push_line(b"out_time_us = 42\r\n"), None);
        let tick = parser.push_line(b"progress=continue\r\n").unwrap();
        assert_eq!(ProgressKey::out_time_us().extract(&tick).unwrap().value, 42);
    }

    #[test]
    fn ignores_lines_without_separator() {
        let mut parser = TickParser::default();
        assert_eq!(parser.push_line(b"garbage"), None);
        assert_eq!(parser.push_line(b"=value"), None);
        let tick = parser.push_line(b"progress=continue").unwrap();
        assert_eq!(tick, ProgressTick::default());
    }

    #[test]
    fn not_available_values_are_skipped() {
        let mut parser = TickParser::default();
        let ticks = feed(&mut parser, "out_time_us=N/A\nprogress=continue\nout_time_us=-5\nprogress=continue\n");
        let key = ProgressKey::out_time_us();
        assert_eq!(key.extract(&ticks[0]), None);
        assert_eq!(key.extract(&ticks[1]), None);
    }

    #[test]
    fn custom_converters() {
        let mut parser = TickParser::default();
        let tick = feed(&mut parser, "speed=2.5x\nprogress=end\n").remove(0);
        let key = ProgressKey::new("speed", |raw: &[u8]| {
            std::str::from_utf8(raw).ok()?.trim_end_matches('x').parse::<f64>().ok()
        });
        assert_eq!(
            key.extract(&tick),
            Some(Progress {
                value:    2.5,
                finished: true,
            })
        );
    }
}
