//! URL bar input handling: classification, segmentation and fixup.

pub mod fixup;
pub mod parser;
pub mod registry;

pub use parser::{build_search_url, classify, AutocompleteInput, InputType};
