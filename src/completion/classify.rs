//! Highlight spans and display strings for completion items.

use crate::completion::item::{Classification, Style};
use crate::url_bar::fixup;

/// Spans for `text` with the run at `location` (of `match_len` bytes)
/// marked as a match. `None` gives one uniform span.
pub fn classify_location(
    location: Option<usize>,
    match_len: usize,
    total_len: usize,
    style: Style,
) -> Vec<Classification> {
    if total_len == 0 {
        return Vec::new();
    }

    let Some(location) = location.filter(|l| *l < total_len && match_len > 0) else {
        return vec![Classification::new(0, style)];
    };

    let mut spans = Vec::with_capacity(3);
    if location != 0 {
        spans.push(Classification::new(0, style));
    }
    spans.push(Classification::new(location, style | Style::MATCH));

    let after = location + match_len;
    if after < total_len {
        spans.push(Classification::new(after, style));
    }
    spans
}

/// Spans highlighting the first case-insensitive occurrence of `find` in
/// `text`
pub fn classify_match_spans(find: &str, text: &str, style: Style) -> Vec<Classification> {
    if find.is_empty() {
        return classify_location(None, 0, text.len(), style);
    }

    // ASCII lowercasing keeps byte offsets stable
    let location = text
        .to_ascii_lowercase()
        .find(&find.to_ascii_lowercase());
    classify_location(location, find.len(), text.len(), style)
}

/// Spans start at zero, increase strictly and stay inside the text
pub fn spans_are_valid(text: &str, spans: &[Classification]) -> bool {
    if text.is_empty() {
        return spans.is_empty();
    }
    match spans.first() {
        Some(first) if first.offset == 0 => {}
        _ => return false,
    }
    spans.windows(2).all(|w| w[0].offset < w[1].offset)
        && spans.iter().all(|s| s.offset < text.len())
}

/// Display form of a URL, dropping "http://" when `trim_http` is set.
/// `offset` is moved along with the text when given.
pub fn format_url(url: &str, trim_http: bool, offset: &mut Option<usize>) -> String {
    let mut text = url.to_string();
    if trim_http {
        let removed = fixup::trim_http_prefix(&mut text);
        if removed > 0 {
            *offset = offset.and_then(|o| o.checked_sub(removed));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_in_middle() {
        let spans = classify_match_spans("dot", "slashdot.org", Style::URL);
        assert_eq!(
            spans,
            vec![
                Classification::new(0, Style::URL),
                Classification::new(5, Style::URL | Style::MATCH),
                Classification::new(8, Style::URL),
            ]
        );
    }

    #[test]
    fn test_match_at_start_and_end() {
        let spans = classify_match_spans("SLASH", "slash", Style::NONE);
        assert_eq!(spans, vec![Classification::new(0, Style::MATCH)]);

        let spans = classify_match_spans("org", "slashdot.org", Style::NONE);
        assert_eq!(
            spans,
            vec![
                Classification::new(0, Style::NONE),
                Classification::new(9, Style::MATCH),
            ]
        );
    }

    #[test]
    fn test_no_match() {
        assert_eq!(
            classify_match_spans("xyz", "slashdot", Style::URL),
            vec![Classification::new(0, Style::URL)]
        );
        assert_eq!(
            classify_match_spans("", "slashdot", Style::NONE),
            vec![Classification::new(0, Style::NONE)]
        );
        assert!(classify_match_spans("a", "", Style::NONE).is_empty());
    }

    #[test]
    fn test_spans_always_cover_text() {
        let texts = ["", "a", "Rust", "http://rust-lang.org/", "größe straße"];
        let finds = ["", "r", "RUST", "lang", "zzz", "stra", "t"];
        for text in texts {
            for find in finds {
                for style in [Style::NONE, Style::URL, Style::DIM] {
                    let spans = classify_match_spans(find, text, style);
                    assert!(spans_are_valid(text, &spans), "{find:?} in {text:?}: {spans:?}");
                }
            }
        }
    }

    #[test]
    fn test_location_out_of_range() {
        assert_eq!(
            classify_location(Some(10), 3, 5, Style::URL),
            vec![Classification::new(0, Style::URL)]
        );
    }

    #[test]
    fn test_format_url() {
        let mut offset = Some(12);
        assert_eq!(format_url("http://slashdot.org/", true, &mut offset), "slashdot.org/");
        assert_eq!(offset, Some(5));

        let mut offset = None;
        assert_eq!(
            format_url("https://slashdot.org/", true, &mut offset),
            "https://slashdot.org/"
        );
    }
}
