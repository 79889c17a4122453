//! Completion item types.

use crate::completion::provider::ProviderKind;
use std::cmp::Ordering;
use std::ops::BitOr;

/// Display style bits for a run of text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Style(u8);

impl Style {
    pub const NONE: Style = Style(0);
    /// A URL
    pub const URL: Style = Style(1 << 0);
    /// Matches what the user typed
    pub const MATCH: Style = Style(1 << 1);
    /// De-emphasized, e.g. a placeholder
    pub const DIM: Style = Style(1 << 2);

    pub fn contains(self, other: Style) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Style {
    type Output = Style;

    fn bitor(self, rhs: Style) -> Style {
        Style(self.0 | rhs.0)
    }
}

/// Style that applies from `offset` up to the next classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub offset: usize,
    pub style: Style,
}

impl Classification {
    pub fn new(offset: usize, style: Style) -> Self {
        Self { offset, style }
    }
}

/// Type of completion item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionType {
    /// A URL not coming from history
    Url,
    /// The typed text, as a URL
    UrlWhatYouTyped,
    /// Previously visited URL matching by prefix
    HistoryUrl,
    /// Full-text history hit in the page title
    HistoryTitle,
    /// Full-text history hit in the page body
    HistoryBody,
    /// The typed text, as a search
    Search,
    /// A past search or a remote query suggestion
    SearchSuggest,
    /// A remote "go to this site" suggestion
    NavSuggest,
    /// "See N previously viewed pages"
    HistorySearchShortcut,
    /// Search through a keyword engine
    Keyword,
}

/// How the navigation should be recorded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Transition {
    /// The user typed the URL
    #[default]
    Typed,
    /// Generated by a search
    Generated,
    /// Search through a keyword engine
    Keyword,
}

/// A single completion item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionItem {
    /// Provider that produced this item
    pub provider: ProviderKind,
    /// Higher is better
    pub relevance: i32,
    /// Loses every tie until the result set is culled; its relevance then
    /// counts as-is
    pub suppressed: bool,
    /// Whether the user may delete this from history
    pub deletable: bool,
    /// Offset into `fill_into_edit` where inline completion starts
    pub inline_autocomplete_offset: Option<usize>,
    pub contents: String,
    pub contents_class: Vec<Classification>,
    pub description: String,
    pub description_class: Vec<Classification>,
    pub destination_url: String,
    /// Text to put in the URL bar when the item is selected
    pub fill_into_edit: String,
    pub transition: Transition,
    pub completion_type: CompletionType,
    pub starred: bool,
    pub is_history_what_you_typed_match: bool,
}

impl CompletionItem {
    pub fn new(
        provider: ProviderKind,
        relevance: i32,
        deletable: bool,
        completion_type: CompletionType,
    ) -> Self {
        Self {
            provider,
            relevance,
            suppressed: false,
            deletable,
            inline_autocomplete_offset: None,
            contents: String::new(),
            contents_class: Vec::new(),
            description: String::new(),
            description_class: Vec::new(),
            destination_url: String::new(),
            fill_into_edit: String::new(),
            transition: Transition::Typed,
            completion_type,
            starred: false,
            is_history_what_you_typed_match: false,
        }
    }

    /// Relevance used for ordering. Suppressed items sort as if negated.
    pub fn sort_relevance(&self) -> i32 {
        if self.suppressed {
            -self.relevance
        } else {
            self.relevance
        }
    }

    /// Ordering for sorting best first: relevance, then contents descending
    pub fn more_relevant(a: &CompletionItem, b: &CompletionItem) -> Ordering {
        b.sort_relevance()
            .cmp(&a.sort_relevance())
            .then_with(|| b.contents.cmp(&a.contents))
    }

    /// Ordering used to dedupe: by destination, best first within one
    pub(crate) fn destination_then_relevance(a: &CompletionItem, b: &CompletionItem) -> Ordering {
        a.destination_url
            .cmp(&b.destination_url)
            .then_with(|| Self::more_relevant(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(relevance: i32, contents: &str) -> CompletionItem {
        let mut item = CompletionItem::new(
            ProviderKind::HistoryUrl,
            relevance,
            false,
            CompletionType::HistoryUrl,
        );
        item.contents = contents.to_string();
        item
    }

    #[test]
    fn test_style_bits() {
        let style = Style::URL | Style::MATCH;
        assert!(style.contains(Style::URL));
        assert!(style.contains(Style::MATCH));
        assert!(!style.contains(Style::DIM));
        assert!(Style::DIM.contains(Style::NONE));
    }

    #[test]
    fn test_more_relevant() {
        let high = item(1000, "a");
        let low = item(900, "z");
        assert_eq!(CompletionItem::more_relevant(&high, &low), Ordering::Less);
        assert_eq!(CompletionItem::more_relevant(&low, &high), Ordering::Greater);

        // ties go to the lexicographically greater contents
        let b = item(900, "b");
        assert_eq!(CompletionItem::more_relevant(&low, &b), Ordering::Less);
    }

    #[test]
    fn test_suppressed_loses_ties() {
        let mut hidden = item(1000, "z");
        hidden.suppressed = true;
        let plain = item(1, "a");
        assert_eq!(hidden.sort_relevance(), -1000);
        assert_eq!(CompletionItem::more_relevant(&plain, &hidden), Ordering::Less);
    }
}
