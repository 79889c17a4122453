//! Search suggestions from the default engine.
//!
//! Always offers "search for what you typed". Past searches come from the
//! history lane and remote suggestions from the network lane, after a
//! debounce timer that restarts on every keystroke.

use crate::completion::classify::{classify_location, classify_match_spans, format_url};
use crate::completion::dispatch::ReplySink;
use crate::completion::item::{Classification, CompletionItem, CompletionType, Style, Transition};
use crate::completion::provider::{
    AutocompleteProvider, ProviderKind, ProviderReply, RequestTokens,
};
use crate::completion::suggest::{parse_suggest_response, NavigationResult, SuggestResults};
use crate::completion::transport::SuggestTransport;
use crate::history::backend::now;
use crate::history::{BookmarkStore, HistoryBackend, KeywordSearchTerm};
use crate::search_engine::{SearchEngine, SearchEngines};
use crate::settings::Settings;
use crate::url_bar::fixup;
use crate::url_bar::{AutocompleteInput, InputType};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const ENTER_QUERY: &str = "<enter query>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SuggestStage {
    /// Waiting for the debounce timer
    Timer,
    /// Waiting for the fetch
    Fetch,
}

pub struct SearchProvider {
    engines: SearchEngines,
    history: Option<Arc<dyn HistoryBackend>>,
    bookmarks: Option<Arc<dyn BookmarkStore>>,
    transport: Arc<dyn SuggestTransport>,
    suggestions_enabled: bool,
    suggest_delay: Duration,
    max_matches: usize,

    input: Option<AutocompleteInput>,
    past_searches: Vec<KeywordSearchTerm>,
    have_past_searches: bool,
    suggest_results: SuggestResults,
    have_suggest_results: bool,
    matches: Vec<CompletionItem>,

    tokens: RequestTokens,
    history_pending: Option<u64>,
    suggest_pending: Option<(u64, SuggestStage)>,
}

impl SearchProvider {
    pub fn new(
        settings: &Settings,
        history: Option<Arc<dyn HistoryBackend>>,
        bookmarks: Option<Arc<dyn BookmarkStore>>,
        transport: Arc<dyn SuggestTransport>,
    ) -> Self {
        Self {
            engines: SearchEngines::from_settings(settings),
            history,
            bookmarks,
            transport,
            suggestions_enabled: settings.search_suggestions_enabled,
            suggest_delay: Duration::from_millis(settings.suggest_delay_ms),
            max_matches: settings.max_matches,
            input: None,
            past_searches: Vec::new(),
            have_past_searches: false,
            suggest_results: SuggestResults::default(),
            have_suggest_results: false,
            matches: Vec::new(),
            tokens: RequestTokens::default(),
            history_pending: None,
            suggest_pending: None,
        }
    }

    fn clear_results(&mut self) {
        self.past_searches.clear();
        self.have_past_searches = false;
        self.suggest_results = SuggestResults::default();
        self.have_suggest_results = false;
    }

    fn start_history_query(&mut self, engine: &SearchEngine, input: &AutocompleteInput, sink: &ReplySink) {
        self.history_pending = None;
        if input.synchronous_only() {
            return;
        }
        let Some(history) = self.history.clone() else {
            return;
        };

        let token = self.tokens.next();
        let engine_id = engine.id.clone();
        let text = input.text().to_string();
        let limit = self.max_matches;
        let queued = sink.on_history_lane(self.kind(), token, move || {
            let terms = history
                .keyword_search_terms(&engine_id, &text, limit)
                .unwrap_or_else(|e| {
                    log::warn!("Past search lookup failed: {}", e);
                    Vec::new()
                });
            ProviderReply::PastSearches(terms)
        });
        if queued {
            self.history_pending = Some(token);
        }
    }

    fn start_or_stop_suggest(
        &mut self,
        engine: &SearchEngine,
        input: &AutocompleteInput,
        minimal_changes: bool,
        sink: &ReplySink,
    ) {
        if !self.suitable_for_suggest(engine, input) {
            self.suggest_pending = None;
            self.suggest_results = SuggestResults::default();
            self.have_suggest_results = false;
            return;
        }

        // same text: keep what we have or are waiting for
        if minimal_changes && (self.suggest_pending.is_some() || self.have_suggest_results) {
            return;
        }

        self.suggest_results = SuggestResults::default();
        self.have_suggest_results = false;

        // a fresh token means an earlier timer no longer counts
        let token = self.tokens.next();
        self.suggest_pending = Some((token, SuggestStage::Timer));
        sink.after(self.suggest_delay, self.kind(), token, ProviderReply::SuggestTimer);
    }

    /// Whether the typed text may be sent to the suggest server
    fn suitable_for_suggest(&self, engine: &SearchEngine, input: &AutocompleteInput) -> bool {
        if !self.suggestions_enabled || engine.suggest_template.is_none() || input.synchronous_only()
        {
            return false;
        }
        if input.text().is_empty() {
            return false;
        }

        let parts = input.parts();
        if parts.scheme.is_some() && input.scheme() != "http" && input.scheme() != "https" {
            return false;
        }
        // typed credentials stay local
        parts.username.is_empty() && parts.password.is_empty()
    }

    fn start_fetch(&mut self, sink: &ReplySink) {
        let Some(input) = &self.input else {
            return;
        };
        let Some(url) = self
            .engines
            .default_engine()
            .and_then(|engine| engine.suggest_url(input.text()))
        else {
            self.suggest_pending = None;
            return;
        };

        let token = self.tokens.next();
        let transport = self.transport.clone();
        log::debug!("Fetching suggestions from {}", url);
        let queued = sink.on_network_lane(self.kind(), token, move || {
            ProviderReply::SuggestBody(transport.fetch(&url))
        });
        self.suggest_pending = queued.then_some((token, SuggestStage::Fetch));
    }

    fn convert_results(&mut self) {
        self.matches.clear();
        let Some(input) = &self.input else {
            return;
        };
        let Some(engine) = self.engines.default_engine() else {
            return;
        };

        let input_type = input.input_type();
        let mut map = MatchMap::default();

        map.add(search_match(
            engine,
            input,
            input.text(),
            what_you_typed_relevance(input_type),
            CompletionType::Search,
        ));

        let now = now();
        for term in &self.past_searches {
            let relevance = past_search_relevance(input_type, now - term.last_visit_time);
            map.add(search_match(engine, input, &term.term, relevance, CompletionType::SearchSuggest));
        }

        let count = self.suggest_results.queries.len();
        for (i, query) in self.suggest_results.queries.iter().enumerate() {
            let relevance = suggest_relevance(input_type) + (count - 1 - i) as i32;
            map.add(search_match(engine, input, query, relevance, CompletionType::SearchSuggest));
        }

        let mut matches = map.into_matches();

        // only the best site suggestion is shown
        let count = self.suggest_results.navigation.len();
        if let Some(navigation) = self.suggest_results.navigation.first() {
            let relevance = navigation_relevance(input_type) + (count - 1) as i32;
            matches.push(navigation_match(input, navigation, relevance));
        }

        matches.sort_by(CompletionItem::more_relevant);
        matches.truncate(self.max_matches);

        if let Some(bookmarks) = &self.bookmarks {
            for item in &mut matches {
                item.starred = bookmarks
                    .is_bookmarked(&item.destination_url)
                    .unwrap_or(false);
            }
        }
        self.matches = matches;
    }
}

impl AutocompleteProvider for SearchProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Search
    }

    fn start(&mut self, input: &AutocompleteInput, minimal_changes: bool, sink: &ReplySink) {
        self.matches.clear();

        let engine = self
            .engines
            .default_engine()
            .filter(|_| input.input_type() != InputType::Invalid)
            .cloned();
        let Some(engine) = engine else {
            self.stop();
            self.clear_results();
            self.input = None;
            return;
        };

        if input.text().is_empty() {
            // "?" alone: nothing to search for yet
            self.stop();
            self.clear_results();
            self.input = Some(input.clone());
            self.matches.push(enter_query_match(&engine));
            return;
        }

        if !minimal_changes {
            self.past_searches.clear();
            self.have_past_searches = false;
        }
        self.input = Some(input.clone());

        if !minimal_changes || (!self.have_past_searches && self.history_pending.is_none()) {
            self.start_history_query(&engine, input, sink);
        }
        self.start_or_stop_suggest(&engine, input, minimal_changes, sink);
        self.convert_results();
    }

    fn stop(&mut self) {
        self.history_pending = None;
        self.suggest_pending = None;
    }

    fn done(&self) -> bool {
        self.history_pending.is_none() && self.suggest_pending.is_none()
    }

    fn matches(&self) -> &[CompletionItem] {
        &self.matches
    }

    fn on_reply(&mut self, token: u64, reply: ProviderReply, sink: &ReplySink) -> bool {
        match reply {
            ProviderReply::PastSearches(terms) if self.history_pending == Some(token) => {
                self.history_pending = None;
                self.past_searches = terms;
                self.have_past_searches = true;
                self.convert_results();
                true
            }
            ProviderReply::SuggestTimer
                if self.suggest_pending == Some((token, SuggestStage::Timer)) =>
            {
                self.start_fetch(sink);
                false
            }
            ProviderReply::SuggestBody(body)
                if self.suggest_pending == Some((token, SuggestStage::Fetch)) =>
            {
                self.suggest_pending = None;
                let Some(input) = &self.input else {
                    return false;
                };
                let parsed =
                    body.and_then(|body| parse_suggest_response(&body, input.text(), self.max_matches));
                match parsed {
                    Ok(results) => {
                        self.suggest_results = results;
                        self.have_suggest_results = true;
                        self.convert_results();
                        true
                    }
                    Err(e) => {
                        log::warn!("Ignoring suggestions for {:?}: {}", input.text(), e);
                        false
                    }
                }
            }
            _ => false,
        }
    }
}

/// Matches keyed by lowercased query. A later entry replaces an earlier
/// one only with strictly higher relevance, so ties keep the first.
#[derive(Default)]
struct MatchMap {
    order: Vec<CompletionItem>,
    index: HashMap<String, usize>,
}

impl MatchMap {
    fn add(&mut self, item: Option<(String, CompletionItem)>) {
        let Some((query, item)) = item else {
            return;
        };
        let key = query.to_lowercase();
        match self.index.get(&key) {
            Some(&i) => {
                if item.relevance > self.order[i].relevance {
                    self.order[i] = item;
                }
            }
            None => {
                self.index.insert(key, self.order.len());
                self.order.push(item);
            }
        }
    }

    fn into_matches(self) -> Vec<CompletionItem> {
        self.order
    }
}

fn what_you_typed_relevance(input_type: InputType) -> i32 {
    match input_type {
        InputType::RequestedUrl => 1200,
        InputType::Url => 850,
        InputType::ForcedQuery => 1500,
        _ => 1300,
    }
}

/// Older searches decay towards zero
fn past_search_relevance(input_type: InputType, elapsed_secs: i64) -> i32 {
    let base = match input_type {
        InputType::Unknown | InputType::RequestedUrl => 1050,
        InputType::Url => 750,
        _ => 1250,
    };
    let decay = (6.5 * (elapsed_secs.max(0) as f64).powf(0.3)) as i32;
    (base - decay).max(0)
}

fn suggest_relevance(input_type: InputType) -> i32 {
    match input_type {
        InputType::Unknown | InputType::RequestedUrl => 600,
        InputType::Url => 300,
        _ => 800,
    }
}

fn navigation_relevance(input_type: InputType) -> i32 {
    match input_type {
        InputType::Unknown | InputType::RequestedUrl => 1000,
        InputType::Url => 1150,
        _ => 800,
    }
}

fn search_prefix(engine: &SearchEngine) -> String {
    format!("Search {} for ", engine.name)
}

/// A search for `query`, keyed by the query for deduplication
fn search_match(
    engine: &SearchEngine,
    input: &AutocompleteInput,
    query: &str,
    relevance: i32,
    completion_type: CompletionType,
) -> Option<(String, CompletionItem)> {
    let destination = engine.search_url(query)?;
    let mut item = CompletionItem::new(ProviderKind::Search, relevance, false, completion_type);

    let prefix = search_prefix(engine);
    item.contents = format!("{prefix}{query}");
    item.contents_class = vec![Classification::new(0, Style::NONE)];
    item.contents_class.extend(
        classify_match_spans(input.text(), query, Style::NONE)
            .into_iter()
            .map(|span| Classification::new(span.offset + prefix.len(), span.style)),
    );

    let forced = input.input_type() == InputType::ForcedQuery;
    let lead = if forced { "?" } else { "" };
    item.fill_into_edit = format!("{lead}{query}");

    let typed = input.text().to_lowercase();
    if !input.prevent_inline_autocomplete() && query.to_lowercase().starts_with(&typed) {
        item.inline_autocomplete_offset = Some(lead.len() + input.text().len());
    }

    item.destination_url = destination.to_string();
    item.transition = Transition::Generated;
    Some((query.to_string(), item))
}

fn navigation_match(
    input: &AutocompleteInput,
    navigation: &NavigationResult,
    relevance: i32,
) -> CompletionItem {
    let mut item =
        CompletionItem::new(ProviderKind::Search, relevance, false, CompletionType::NavSuggest);
    item.destination_url = navigation.url.clone();

    let trim_http = !fixup::has_http_scheme(input.text());
    item.contents = format_url(&navigation.url, trim_http, &mut None);
    item.contents_class = classify_match_spans(input.text(), &item.contents, Style::URL);
    item.fill_into_edit = item.contents.clone();
    item.description = navigation.site_name.clone();
    item.description_class = classify_location(None, 0, item.description.len(), Style::NONE);
    item
}

/// Placeholder shown for a lone "?"
fn enter_query_match(engine: &SearchEngine) -> CompletionItem {
    let mut item = CompletionItem::new(ProviderKind::Search, 0, false, CompletionType::Search);
    let prefix = search_prefix(engine);
    item.contents = format!("{prefix}{ENTER_QUERY}");
    item.contents_class = vec![
        Classification::new(0, Style::NONE),
        Classification::new(prefix.len(), Style::DIM),
    ];
    item.fill_into_edit = "?".to_string();
    item.transition = Transition::Generated;
    item
}
