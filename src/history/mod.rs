//! Browsing history storage consumed by the autocomplete providers.

pub mod backend;
pub mod database;
pub mod in_memory;

pub use backend::{
    BookmarkMatch, BookmarkStore, FullTextOptions, FullTextRow, HistoryBackend, KeywordSearchTerm,
    UrlDatabase, UrlRow,
};
pub use database::HistoryDatabase;
pub use in_memory::InMemoryUrlIndex;
