//! Address bar autocomplete for the qayeq browser.
//!
//! Typed text is classified by [`url_bar`], handed to the providers in
//! [`completion`] and merged into a ranked [`completion::CompletionResult`].
//! History and bookmarks live in [`history`].

pub mod completion;
pub mod config;
pub mod error;
pub mod history;
pub mod search_engine;
pub mod settings;
pub mod url_bar;

pub use error::{Error, Result};
