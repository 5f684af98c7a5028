//! CMX3600-style edit decision lists.

use anyhow::Result;

use super::parts;
use crate::cuts::Cut;

/// `HH:MM:SS:cc`, the last field in centiseconds.
fn timecode(ms: u64) -> String {
    let centis = (ms % 1000) / 10;
    let seconds = ms / 1000;
    format!("{:02}:{:02}:{:02}:{centis:02}", seconds / 3600, (seconds / 60) % 60, seconds % 60)
}

/// One video and one audio event per cut, laid back to back on the record
/// timeline.
#[inline]
pub fn write_edl(title: &str, cuts: &[Cut]) -> Result<String> {
    let mut lines = vec![format!("TITLE: {title}")];

    let mut record_in = 0;
    for (index, part) in parts(cuts)?.iter().enumerate() {
        let record_out = record_in + part.duration_ms();
        let timing = format!(
            "{} {} {} {}",
            timecode(part.start_ms),
            timecode(part.end_ms),
            timecode(record_in),
            timecode(record_out)
        );

        lines.push(String::new());
        lines.push(format!("{index:03} BL V C {timing}"));
        lines.push(format!("{index:03} AX A C {timing}"));
        lines.push(format!("* FROM CLIP NAME: {}", part.video.display()));

        record_in = record_out;
    }

    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::cuts;

    #[test]
    fn timecodes() {
        assert_eq!(timecode(0), "00:00:00:00");
        assert_eq!(timecode(3_723_456), "01:02:03:45");
        assert_eq!(timecode(59_999), "00:00:59:99");
    }

    #[test]
    fn events_are_laid_back_to_back() {
        let edl = write_edl("Supercut", &cuts(&[("/v/a.mkv", 61_000, 62_500), ("/v/b.mkv", 10, 1010)])).unwrap();
        let expected = "TITLE: Supercut

000 BL V C 00:01:01:00 00:01:02:50 00:00:00:00 00:00:01:50
000 AX A C 00:01:01:00 00:01:02:50 00:00:00:00 00:00:01:50
* FROM CLIP NAME: /v/a.mkv

001 BL V C 00:00:00:01 00:00:01:01 00:00:01:50 00:00:02:50
001 AX A C 00:00:00:01 00:00:01:01 00:00:01:50 00:00:02:50
* FROM CLIP NAME: /v/b.mkv";
        assert_eq!(edl, expected);
    }

    #[test]
    fn empty_list_is_just_the_title() {
        assert_eq!(write_edl("Nothing", &[]).unwrap(), "TITLE: Nothing");
    }
}
