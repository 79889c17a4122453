//! The interface every completion source implements.

use crate::completion::dispatch::ReplySink;
use crate::completion::item::CompletionItem;
use crate::history::{FullTextRow, KeywordSearchTerm};
use crate::url_bar::AutocompleteInput;

/// The completion sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Visited URLs matching by prefix
    HistoryUrl,
    /// Search engine suggestions
    Search,
    /// Bookmark titles and page text
    HistoryContents,
    /// Keyword search engines
    Keyword,
}

impl ProviderKind {
    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::HistoryUrl => "history-url",
            ProviderKind::Search => "search",
            ProviderKind::HistoryContents => "history-contents",
            ProviderKind::Keyword => "keyword",
        }
    }
}

/// Work finished off the controller thread, handed back for the
/// provider that asked for it
#[derive(Debug)]
pub enum ProviderReply {
    /// Second history pass; `None` when the store failed
    HistoryUrls(Option<Vec<CompletionItem>>),
    /// Past searches through the default engine
    PastSearches(Vec<KeywordSearchTerm>),
    /// The suggest debounce timer fired
    SuggestTimer,
    /// Raw suggest response body
    SuggestBody(crate::Result<Vec<u8>>),
    /// Full-text history rows
    FullText(Vec<FullTextRow>),
}

/// A reply addressed to a provider. `token` identifies the request; a
/// provider ignores tokens it no longer waits for.
#[derive(Debug)]
pub struct Envelope {
    pub provider: ProviderKind,
    pub token: u64,
    pub reply: ProviderReply,
}

/// How many full-text rows matched, for the history search shortcut
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryContentsInfo {
    pub db_match_count: usize,
    /// The store had more rows than were fetched
    pub hit_limit: bool,
}

pub trait AutocompleteProvider {
    fn kind(&self) -> ProviderKind;

    /// Begin a query. `minimal_changes` means the text is unchanged since
    /// the last call, so earlier work may be kept.
    fn start(&mut self, input: &AutocompleteInput, minimal_changes: bool, sink: &ReplySink);

    /// Abandon outstanding work. Replies already in flight are dropped.
    fn stop(&mut self);

    /// No more replies are expected for the current query
    fn done(&self) -> bool;

    fn matches(&self) -> &[CompletionItem];

    /// Handle a reply. Returns whether `matches` changed.
    fn on_reply(&mut self, token: u64, reply: ProviderReply, sink: &ReplySink) -> bool;

    /// Drop matches for the item's destination. The provider that produced
    /// the item also deletes it from its store.
    fn delete_match(&mut self, _item: &CompletionItem) {}

    fn history_contents_info(&self) -> Option<HistoryContentsInfo> {
        None
    }
}

/// Hands out request tokens and remembers which one is current
#[derive(Debug, Default)]
pub(crate) struct RequestTokens {
    last: u64,
}

impl RequestTokens {
    pub(crate) fn next(&mut self) -> u64 {
        self.last += 1;
        self.last
    }
}
