//! Interfaces the providers use to read history and bookmarks.
//!
//! Implementations must be safe to call from the worker lanes while the
//! controller thread keeps using its own copy of the in-memory index.

use crate::error::Result;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch
pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// A row of the URL table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlRow {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub visit_count: i32,
    pub typed_count: i32,
    /// Seconds since the Unix epoch
    pub last_visit_time: i64,
}

impl UrlRow {
    /// A row for a URL we have no history for
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }
}

/// Options for a full-text query. Rows are reported once per URL, at
/// their most recent visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullTextOptions {
    /// Only rows visited at or after this time
    pub begin_time: i64,
    pub max_count: usize,
}

/// A full-text hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullTextRow {
    pub row: UrlRow,
    /// Whether any of the query words occur in the title
    pub title_match: bool,
}

/// A past search issued through a search engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordSearchTerm {
    pub term: String,
    pub last_visit_time: i64,
}

/// A bookmark whose title matched a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkMatch {
    pub url: String,
    pub title: String,
}

/// URL lookups shared by the in-memory index and the on-disk store
pub trait UrlDatabase {
    /// Rows whose URL starts with `prefix`, best first
    fn autocomplete_for_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<UrlRow>>;

    fn row_for_url(&self, url: &str) -> Result<Option<UrlRow>>;

    /// The shortest URL that starts with `base` and is a prefix of `target`
    /// (excluding `target`), with at least the given visit and typed counts.
    /// `base` itself qualifies only when `allow_base` is set.
    fn find_shortest_url_between(
        &self,
        base: &str,
        target: &str,
        min_visits: i32,
        min_typed: i32,
        allow_base: bool,
    ) -> Result<Option<UrlRow>>;
}

/// The full persistent history store
pub trait HistoryBackend: UrlDatabase + Send + Sync {
    /// URLs the most recent visit of `url` redirected through, in order
    fn most_recent_redirects_from(&self, url: &str) -> Result<Vec<String>>;

    fn query_full_text(&self, text: &str, options: &FullTextOptions) -> Result<Vec<FullTextRow>>;

    /// Past searches through `engine` starting with `prefix`, newest first
    fn keyword_search_terms(
        &self,
        engine: &str,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<KeywordSearchTerm>>;

    /// Every URL typed at least once, for building the in-memory index
    fn typed_urls(&self) -> Result<Vec<UrlRow>>;

    fn delete_url(&self, url: &str) -> Result<()>;
}

pub trait BookmarkStore: Send + Sync {
    fn titles_matching(&self, text: &str, limit: usize) -> Result<Vec<BookmarkMatch>>;

    fn is_bookmarked(&self, url: &str) -> Result<bool>;
}
