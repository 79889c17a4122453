//! URL completion: providers, the merged result and the controller that
//! drives them.

pub mod classify;
pub mod contents_provider;
pub mod controller;
pub mod dispatch;
pub mod history_provider;
pub mod item;
pub mod keyword_provider;
pub mod provider;
pub mod result;
pub mod search_provider;
pub mod suggest;
pub mod transport;

pub use controller::{CompletionController, UpdateListener};
pub use item::{Classification, CompletionItem, CompletionType, Style, Transition};
pub use provider::{AutocompleteProvider, ProviderKind};
pub use result::{CompletionResult, Selection};
pub use transport::{HttpTransport, SuggestTransport};
