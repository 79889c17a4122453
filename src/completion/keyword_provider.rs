//! Keyword search engines: "w rust" searches the engine whose keyword is
//! "w" for "rust".

use crate::completion::dispatch::ReplySink;
use crate::completion::item::{Classification, CompletionItem, CompletionType, Style, Transition};
use crate::completion::provider::{AutocompleteProvider, ProviderKind, ProviderReply};
use crate::search_engine::{SearchEngine, SearchEngines};
use crate::settings::Settings;
use crate::url_bar::{AutocompleteInput, InputType};

/// Split "kw terms" into the lowercased keyword and the remaining text
fn split_keyword(text: &str) -> (String, &str) {
    let text = text.trim_start();
    match text.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword.to_lowercase(), rest.trim_start()),
        None => (text.to_lowercase(), ""),
    }
}

fn keyword_relevance(input_type: InputType, complete: bool) -> i32 {
    match (complete, input_type) {
        (false, InputType::Url) => 700,
        (false, _) => 450,
        (true, InputType::Query) => 1450,
        (true, _) => 1100,
    }
}

pub struct KeywordProvider {
    engines: SearchEngines,
    matches: Vec<CompletionItem>,
}

impl KeywordProvider {
    pub fn new(settings: &Settings) -> Self {
        Self {
            engines: SearchEngines::from_settings(settings),
            matches: Vec::new(),
        }
    }
}

impl AutocompleteProvider for KeywordProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Keyword
    }

    fn start(&mut self, input: &AutocompleteInput, _minimal_changes: bool, _sink: &ReplySink) {
        self.matches.clear();

        if matches!(input.input_type(), InputType::Invalid | InputType::ForcedQuery)
            || input.parts().scheme.is_some()
        {
            return;
        }

        let (keyword, remaining) = split_keyword(input.text());
        if keyword.is_empty() {
            return;
        }

        if let Some(engine) = self.engines.by_keyword(&keyword) {
            let relevance = keyword_relevance(input.input_type(), true);
            if let Some(item) = keyword_match(engine, remaining, relevance) {
                self.matches.push(item);
            }
            return;
        }

        // "Search X for" completions only while the keyword is being typed
        if !remaining.is_empty() {
            return;
        }
        let base = keyword_relevance(input.input_type(), false);
        for (n, engine) in self.engines.keywords_starting_with(&keyword).into_iter().enumerate() {
            let Some(mut item) = keyword_match(engine, "", base - n as i32) else {
                continue;
            };
            if !input.prevent_inline_autocomplete() {
                item.inline_autocomplete_offset = Some(keyword.len());
            }
            self.matches.push(item);
        }
    }

    fn stop(&mut self) {}

    fn done(&self) -> bool {
        true
    }

    fn matches(&self) -> &[CompletionItem] {
        &self.matches
    }

    fn on_reply(&mut self, _token: u64, _reply: ProviderReply, _sink: &ReplySink) -> bool {
        false
    }
}

fn keyword_match(engine: &SearchEngine, terms: &str, relevance: i32) -> Option<CompletionItem> {
    let destination = engine.search_url(terms)?;
    let mut item =
        CompletionItem::new(ProviderKind::Keyword, relevance, false, CompletionType::Keyword);

    let prefix = format!("Search {} for ", engine.name);
    if terms.is_empty() {
        item.contents = format!("{prefix}<enter query>");
        item.contents_class = vec![
            Classification::new(0, Style::NONE),
            Classification::new(prefix.len(), Style::DIM),
        ];
    } else {
        item.contents = format!("{prefix}{terms}");
        item.contents_class = vec![Classification::new(0, Style::NONE)];
    }

    item.fill_into_edit = format!("{} {}", engine.keyword, terms);
    item.destination_url = destination.to_string();
    item.transition = Transition::Keyword;
    Some(item)
}
