use itertools::Itertools;

use crate::subtitle::{Event, SubtitleDocument};

/// Dialogue lines containing `query` (case-insensitive), optionally spoken by
/// `name`. Markup is part of the searched text.
#[inline]
pub fn query_events<'a>(document: &'a SubtitleDocument, query: &str, name: Option<&str>) -> Vec<&'a Event> {
    let query = query.to_lowercase();
    let name = name.map(str::to_lowercase);

    document
        .events
        .iter()
        .filter(|event| !event.is_comment())
        .filter(|event| event.text.to_lowercase().contains(&query))
        .filter(|event| name.as_ref().is_none_or(|name| event.name.to_lowercase() == *name))
        .collect()
}

/// How often each speaker appears in `events`, most frequent first. Ties are
/// ordered by name, descending.
#[inline]
pub fn speaker_counts<'a>(events: impl IntoIterator<Item = &'a Event>) -> Vec<(String, usize)> {
    events
        .into_iter()
        .counts_by(|event| event.name.clone())
        .into_iter()
        .sorted_by(|(a_name, a_count), (b_name, b_count)| b_count.cmp(a_count).then_with(|| b_name.cmp(a_name)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::EventKind;

    fn sample() -> SubtitleDocument {
        let mut comment = Event::dialogue(0, 10, "Hello from a comment");
        comment.kind = EventKind::Comment;
        SubtitleDocument::with_events(vec![
            Event::dialogue(0, 100, "Hello there").with_name("Alice"),
            Event::dialogue(100, 200, "General KENOBI").with_name("Bob"),
            Event::dialogue(200, 300, "well HELLO").with_name("alice"),
            Event::dialogue(300, 400, "bye").with_name("Carol"),
            comment,
        ])
    }

    #[test]
    fn matches_case_insensitively() {
        let document = sample();
        let texts: Vec<&str> = query_events(&document, "hello", None).iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["Hello there", "well HELLO"]);
        assert_eq!(query_events(&document, "kenobi", None).len(), 1);
    }

    #[test]
    fn filters_by_speaker() {
        let document = sample();
        assert_eq!(query_events(&document, "", Some("ALICE")).len(), 2);
        assert!(query_events(&document, "bye", Some("Alice")).is_empty());
    }

    #[test]
    fn counts_speakers() {
        let document = sample();
        let counts = speaker_counts(query_events(&document, "", None));
        assert_eq!(
            counts,
            [
                ("alice".to_owned(), 1),
                ("Carol".to_owned(), 1),
                ("Bob".to_owned(), 1),
                ("Alice".to_owned(), 1)
            ]
        );

        let repeated = SubtitleDocument::with_events(vec![
            Event::dialogue(0, 1, "x").with_name("A"),
            Event::dialogue(1, 2, "x").with_name("B"),
            Event::dialogue(2, 3, "x").with_name("B"),
        ]);
        assert_eq!(
            speaker_counts(&repeated.events),
            [("B".to_owned(), 2), ("A".to_owned(), 1)]
        );
    }
}
