/// Role labels the model sometimes echoes in front of its reply, in priority order.
const SPEAKER_LABELS: [&str; 2] = ["teacher): ", "teacher: "];

/// Drops everything up to and including the first speaker label in `text`.
///
/// `"teacher): "` is looked for first; `"teacher: "` only if it is absent.
/// Text without either label is returned unchanged.
pub fn strip_speaker_label(text: &str) -> &str {
    SPEAKER_LABELS
        .iter()
        .find_map(|label| text.find(label).map(|idx| &text[idx + label.len()..]))
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_parenthesized_label() {
        assert_eq!(strip_speaker_label("Foo teacher): bar"), "bar");
    }

    #[test]
    fn test_strips_plain_label() {
        assert_eq!(strip_speaker_label("Foo teacher: bar"), "bar");
    }

    #[test]
    fn test_unlabelled_text_is_unchanged() {
        assert_eq!(strip_speaker_label("no marker here"), "no marker here");
        assert_eq!(strip_speaker_label(""), "");
    }

    #[test]
    fn test_parenthesized_label_takes_precedence() {
        assert_eq!(
            strip_speaker_label("Student (to the teacher): I think teacher: is a word"),
            "I think teacher: is a word"
        );
        // The parenthesized form wins even when the plain form appears earlier.
        assert_eq!(strip_speaker_label("teacher: one teacher): two"), "two");
    }

    #[test]
    fn test_only_first_occurrence_is_consumed() {
        assert_eq!(
            strip_speaker_label("a teacher): b teacher): c"),
            "b teacher): c"
        );
    }
}
