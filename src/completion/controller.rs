//! Runs the providers and merges their matches into one result.
//!
//! The controller owns the input, the result and the reply channel. Work
//! that finishes on the lanes only reaches providers when the caller
//! pumps replies with [`CompletionController::process_replies`], so all
//! match state is touched on the caller's thread.

use crate::completion::classify::classify_location;
use crate::completion::contents_provider::HistoryContentsProvider;
use crate::completion::dispatch::ReplySink;
use crate::completion::history_provider::HistoryUrlProvider;
use crate::completion::item::{CompletionItem, CompletionType, Style, Transition};
use crate::completion::keyword_provider::KeywordProvider;
use crate::completion::provider::{AutocompleteProvider, Envelope, ProviderKind};
use crate::completion::result::{CompletionResult, Selection};
use crate::completion::search_provider::SearchProvider;
use crate::completion::transport::SuggestTransport;
use crate::config;
use crate::error::Result;
use crate::history::{BookmarkStore, HistoryBackend, HistoryDatabase, InMemoryUrlIndex};
use crate::settings::{ExternalProtocols, Settings};
use crate::url_bar::AutocompleteInput;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Told about result changes after replies were handled
pub trait UpdateListener {
    fn on_update(&mut self, result: &CompletionResult, changed: bool, all_done: bool);
}

impl<F> UpdateListener for F
where
    F: FnMut(&CompletionResult, bool, bool),
{
    fn on_update(&mut self, result: &CompletionResult, changed: bool, all_done: bool) {
        self(result, changed, all_done)
    }
}

pub struct CompletionController {
    providers: Vec<Box<dyn AutocompleteProvider>>,
    sink: ReplySink,
    replies: Receiver<Envelope>,
    protocols: ExternalProtocols,
    shortcut_template: String,
    shortcut_many_template: String,
    input: Option<AutocompleteInput>,
    result: CompletionResult,
    done: bool,
}

impl CompletionController {
    /// Controller with the standard providers. Without a history store
    /// only search and keyword matches are produced.
    pub fn new(
        settings: &Settings,
        history: Option<Arc<HistoryDatabase>>,
        transport: Arc<dyn SuggestTransport>,
    ) -> Result<Self> {
        let backend = history.clone().map(|h| h as Arc<dyn HistoryBackend>);
        let bookmarks = history.map(|h| h as Arc<dyn BookmarkStore>);

        let in_memory = match &backend {
            Some(backend) => match InMemoryUrlIndex::load(backend.as_ref()) {
                Ok(index) => Some(index),
                Err(e) => {
                    log::warn!("Failed to load typed URLs, skipping the first pass: {}", e);
                    None
                }
            },
            None => None,
        };

        let providers: Vec<Box<dyn AutocompleteProvider>> = vec![
            Box::new(HistoryUrlProvider::new(
                backend.clone(),
                in_memory,
                bookmarks.clone(),
                settings.max_matches,
            )),
            Box::new(KeywordProvider::new(settings)),
            Box::new(SearchProvider::new(settings, backend.clone(), bookmarks.clone(), transport)),
            Box::new(HistoryContentsProvider::new(settings, backend, bookmarks)),
        ];

        Self::with_providers(settings, providers)
    }

    pub fn with_providers(
        settings: &Settings,
        providers: Vec<Box<dyn AutocompleteProvider>>,
    ) -> Result<Self> {
        let (sink, replies) = ReplySink::new()?;
        Ok(Self {
            providers,
            sink,
            replies,
            protocols: settings.external_protocols.clone(),
            shortcut_template: settings.recent_history_template.clone(),
            shortcut_many_template: settings.recent_history_many_template.clone(),
            input: None,
            result: CompletionResult::new(settings.max_matches),
            done: true,
        })
    }

    /// Classify `text` with the configured protocol policy
    pub fn make_input(
        &self,
        text: &str,
        desired_tld: &str,
        prevent_inline_autocomplete: bool,
        synchronous_only: bool,
    ) -> AutocompleteInput {
        AutocompleteInput::new(
            text,
            desired_tld,
            prevent_inline_autocomplete,
            synchronous_only,
            &self.protocols,
        )
    }

    /// Start a query. Providers may reuse earlier work when
    /// `allow_incremental` is set and the text did not change. Returns
    /// whether every provider finished synchronously; the listener is not
    /// called for this.
    pub fn start(&mut self, input: AutocompleteInput, allow_incremental: bool) -> bool {
        let minimal_changes =
            allow_incremental && self.input.as_ref().is_some_and(|previous| previous.equals(&input));

        log::debug!(
            "Starting completion for {:?} ({:?}, minimal changes: {})",
            input.text(),
            input.input_type(),
            minimal_changes
        );

        for provider in &mut self.providers {
            provider.start(&input, minimal_changes, &self.sink);
        }
        self.input = Some(input);

        self.done = self.all_done();
        self.rebuild(Selection::default());
        self.done
    }

    /// Stop every provider that is still working. Late replies are dropped.
    pub fn stop(&mut self, clear_result: bool) {
        for provider in &mut self.providers {
            if !provider.done() {
                provider.stop();
            }
        }
        self.done = true;
        if clear_result {
            self.result.clear();
        }
    }

    pub fn result(&self) -> &CompletionResult {
        &self.result
    }

    pub fn done(&self) -> bool {
        self.done
    }

    pub fn input(&self) -> Option<&AutocompleteInput> {
        self.input.as_ref()
    }

    /// Wait up to `timeout` for a reply, then handle everything queued.
    /// Returns the number of replies handled.
    pub fn process_replies(&mut self, timeout: Duration, listener: &mut dyn UpdateListener) -> usize {
        let first = match self.replies.recv_timeout(timeout) {
            Ok(envelope) => envelope,
            Err(_) => return 0,
        };

        let mut handled = 0;
        let mut changed = false;
        let mut next = Some(first);
        while let Some(envelope) = next {
            changed |= self.dispatch(envelope);
            handled += 1;
            next = match self.replies.try_recv() {
                Ok(envelope) => Some(envelope),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
            };
        }

        let was_done = self.done;
        self.done = self.all_done();
        if changed || self.done != was_done {
            let previous = self.result.default_item().map(Selection::of).unwrap_or_default();
            self.rebuild(previous);
            listener.on_update(&self.result, changed, self.done);
        }
        handled
    }

    /// Pump replies until every provider is done or `timeout` passes.
    /// Returns whether all providers finished.
    pub fn run_until_done(&mut self, timeout: Duration, listener: &mut dyn UpdateListener) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.done {
            let now = Instant::now();
            if now >= deadline {
                log::debug!("Completion timed out with providers still running");
                return false;
            }
            self.process_replies(deadline - now, listener);
        }
        true
    }

    /// Delete the item at `index` from history. Returns false when it is
    /// not deletable.
    pub fn delete_match(&mut self, index: usize) -> bool {
        let Some(item) = self.result.get(index).cloned() else {
            return false;
        };
        if !item.deletable {
            return false;
        }
        for provider in &mut self.providers {
            provider.delete_match(&item);
        }
        log::info!("Deleted {} from {}", item.destination_url, item.provider.name());
        self.rebuild(Selection::default());
        true
    }

    fn dispatch(&mut self, envelope: Envelope) -> bool {
        let Some(provider) = self
            .providers
            .iter_mut()
            .find(|p| p.kind() == envelope.provider)
        else {
            return false;
        };
        provider.on_reply(envelope.token, envelope.reply, &self.sink)
    }

    fn all_done(&self) -> bool {
        self.providers.iter().all(|p| p.done())
    }

    fn rebuild(&mut self, selection: Selection) {
        self.result.clear();
        for provider in &self.providers {
            self.result.append(provider.matches());
        }
        self.result.sort_and_cull();
        self.add_history_contents_shortcut();
        self.result.select_default(&selection);
    }

    /// Point to the full-text history search when it found more pages
    /// than the result shows
    fn add_history_contents_shortcut(&mut self) {
        let Some(input) = &self.input else {
            return;
        };
        let Some(provider) = self
            .providers
            .iter()
            .find(|p| p.kind() == ProviderKind::HistoryContents)
        else {
            return;
        };
        if !provider.done() {
            return;
        }
        let Some(info) = provider.history_contents_info() else {
            return;
        };

        let visible = self
            .result
            .iter()
            .filter(|m| m.provider == ProviderKind::HistoryContents)
            .count();
        if info.db_match_count == 0 || info.db_match_count <= visible {
            return;
        }

        if info.db_match_count == 1 {
            // a lone page beats a shortcut to it
            let Some(first) = provider.matches().first() else {
                return;
            };
            if self
                .result
                .iter()
                .any(|m| m.destination_url == first.destination_url)
            {
                return;
            }
            let mut item = first.clone();
            item.suppressed = false;
            self.result.add(item);
            return;
        }

        let query = input.text();
        let template = if info.hit_limit {
            &self.shortcut_many_template
        } else {
            &self.shortcut_template
        };
        let item = history_shortcut(template, query, info.db_match_count);
        self.result.add(item);
    }
}

fn history_shortcut(template: &str, query: &str, count: usize) -> CompletionItem {
    let with_count = template.replace("{count}", &count.to_string());
    let query_offset = with_count.find("{query}");
    let contents = with_count.replacen("{query}", query, 1);

    let mut item = CompletionItem::new(
        ProviderKind::HistoryContents,
        0,
        false,
        CompletionType::HistorySearchShortcut,
    );
    item.contents_class = classify_location(query_offset, query.len(), contents.len(), Style::NONE);
    item.contents = contents;
    item.destination_url = config::HISTORY_SEARCH_URL.replace("{}", &urlencoding::encode(query));
    item.fill_into_edit = query.to_string();
    item.transition = Transition::Generated;
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::classify::spans_are_valid;
    use crate::error::Error;
    use crate::history::UrlRow;
    use crate::history::backend::now;
    use url::Url;

    struct Offline;

    impl SuggestTransport for Offline {
        fn fetch(&self, _url: &Url) -> Result<Vec<u8>> {
            Err(Error::Transport("offline".into()))
        }
    }

    struct Canned(&'static str);

    impl SuggestTransport for Canned {
        fn fetch(&self, _url: &Url) -> Result<Vec<u8>> {
            Ok(self.0.as_bytes().to_vec())
        }
    }

    fn settings() -> Settings {
        Settings {
            suggest_delay_ms: 0,
            ..Default::default()
        }
    }

    fn store(rows: &[(&str, i32, i32)]) -> Arc<HistoryDatabase> {
        let db = HistoryDatabase::open_in_memory().unwrap();
        for (url, visits, typed) in rows {
            db.import_row(&UrlRow {
                url: url.to_string(),
                visit_count: *visits,
                typed_count: *typed,
                last_visit_time: now(),
                ..Default::default()
            })
            .unwrap();
        }
        Arc::new(db)
    }

    fn complete(controller: &mut CompletionController, text: &str) -> Vec<(bool, bool)> {
        let input = controller.make_input(text, "", false, false);
        controller.start(input, false);
        let mut updates = Vec::new();
        let mut listener = |_: &CompletionResult, changed: bool, done: bool| {
            updates.push((changed, done));
        };
        assert!(controller.run_until_done(Duration::from_secs(5), &mut listener));
        updates
    }

    fn urls(controller: &CompletionController) -> Vec<String> {
        controller
            .result()
            .iter()
            .map(|m| m.destination_url.clone())
            .collect()
    }

    #[test]
    fn test_synchronous_start_is_done() {
        let mut controller =
            CompletionController::new(&settings(), None, Arc::new(Offline)).unwrap();
        let input = controller.make_input("rust", "", false, true);
        assert!(controller.start(input, false));
        assert!(controller.done());

        let result = controller.result();
        assert!(result.default_item().is_some());
        assert!(result.iter().any(|m| m.is_history_what_you_typed_match));
        assert!(result.iter().any(|m| m.provider == ProviderKind::Search));

        let mut calls = 0;
        let mut listener = |_: &CompletionResult, _: bool, _: bool| calls += 1;
        assert_eq!(controller.process_replies(Duration::from_millis(100), &mut listener), 0);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_incremental_start_reuses_suggestions() {
        let mut controller = CompletionController::new(
            &settings(),
            None,
            Arc::new(Canned(r#"["rust", ["rust lang"]]"#)),
        )
        .unwrap();
        complete(&mut controller, "rust");
        let has_suggestion =
            |c: &CompletionController| c.result().iter().any(|m| m.fill_into_edit == "rust lang");
        assert!(has_suggestion(&controller));

        // identical input: nothing to wait for
        let same = controller.make_input("rust", "", false, false);
        assert!(controller.start(same, true));
        assert!(has_suggestion(&controller));

        // a changed flag is a new query
        let changed = controller.make_input("rust", "", true, false);
        assert!(!controller.start(changed, true));
        controller.stop(false);
    }

    #[test]
    fn test_results_are_merged() {
        let db = store(&[("http://slashdot.org/favorite_page.html", 200, 100)]);
        let mut controller =
            CompletionController::new(&settings(), Some(db), Arc::new(Offline)).unwrap();
        let updates = complete(&mut controller, "slash");

        assert!(updates.last().unwrap().1);

        let result = controller.result();
        let default = result.default_item().unwrap();
        assert_eq!(default.destination_url, "http://slashdot.org/favorite_page.html");
        assert_eq!(default.inline_autocomplete_offset, Some(5));

        let urls = urls(&controller);
        assert!(urls.contains(&"http://slashdot.org/".to_string()));
        assert!(urls.contains(&"https://duckduckgo.com/?q=slash".to_string()));
        assert!(result.len() <= result.max_matches() + 1);
        for item in result.iter() {
            assert!(spans_are_valid(&item.contents, &item.contents_class));
        }
    }

    #[test]
    fn test_forced_query() {
        let db = store(&[("http://rust-lang.org/", 10, 5)]);
        let mut controller =
            CompletionController::new(&settings(), Some(db), Arc::new(Offline)).unwrap();

        let input = controller.make_input("?", "", false, false);
        assert!(controller.start(input, false));
        let result = controller.result();
        assert_eq!(result.len(), 1);
        assert_eq!(result.get(0).unwrap().fill_into_edit, "?");

        complete(&mut controller, "?rust");
        let default = controller.result().default_item().unwrap();
        assert_eq!(default.relevance, 1500);
        assert_eq!(default.fill_into_edit, "?rust");
        assert!(controller
            .result()
            .iter()
            .all(|m| m.provider != ProviderKind::HistoryUrl));
    }

    #[test]
    fn test_new_query_drops_old_replies() {
        let db = store(&[("http://slashdot.org/", 50, 10)]);
        let mut controller = CompletionController::new(
            &settings(),
            Some(db),
            Arc::new(Canned(r#"["sl", ["sloth"]]"#)),
        )
        .unwrap();

        let first = controller.make_input("sl", "", false, false);
        controller.start(first, false);
        complete(&mut controller, "slash");

        // "sloth" answered "sl" and must not leak into "slash"
        assert!(controller
            .result()
            .iter()
            .all(|m| m.fill_into_edit != "sloth"));
    }

    #[test]
    fn test_history_shortcut() {
        let db = store(&[]);
        for i in 0..6 {
            let url = Url::parse(&format!("http://crabs.example/{i}")).unwrap();
            db.record_visit(&url, Some("Crab facts"), false).unwrap();
            db.set_page_text(&url, "ferris the crab").unwrap();
        }
        let mut controller =
            CompletionController::new(&settings(), Some(db), Arc::new(Offline)).unwrap();
        complete(&mut controller, "ferris");

        let result = controller.result();
        let shortcut = result
            .iter()
            .find(|m| m.completion_type == CompletionType::HistorySearchShortcut)
            .unwrap();
        assert_eq!(shortcut.contents, "See 6 previously viewed pages containing ferris");
        assert_eq!(shortcut.destination_url, "about:history?q=ferris");
        assert_eq!(shortcut.relevance, 0);
        assert!(spans_are_valid(&shortcut.contents, &shortcut.contents_class));
        let matched = shortcut
            .contents_class
            .iter()
            .find(|c| c.style.contains(Style::MATCH))
            .unwrap();
        assert_eq!(matched.offset, shortcut.contents.find("ferris").unwrap());

        let visible = result
            .iter()
            .filter(|m| m.completion_type == CompletionType::HistoryBody)
            .count();
        // three shown plus one suppressed row filling the last free slot
        assert_eq!(visible, 4);
    }

    #[test]
    fn test_single_page_instead_of_shortcut() {
        let shortcut = history_shortcut("Search recent history for {query}", "a b", 60);
        assert_eq!(shortcut.contents, "Search recent history for a b");
        assert_eq!(shortcut.destination_url, "about:history?q=a%20b");

        let db = store(&[]);
        let url = Url::parse("http://crabs.example/").unwrap();
        db.record_visit(&url, Some("Crab facts"), false).unwrap();
        let mut controller =
            CompletionController::new(&settings(), Some(db), Arc::new(Offline)).unwrap();
        complete(&mut controller, "crab facts");

        let result = controller.result();
        assert!(result
            .iter()
            .all(|m| m.completion_type != CompletionType::HistorySearchShortcut));
        assert!(result
            .iter()
            .any(|m| m.destination_url == "http://crabs.example/"));
    }

    #[test]
    fn test_delete_match() {
        let db = store(&[("http://slashdot.org/", 50, 10)]);
        let mut controller =
            CompletionController::new(&settings(), Some(db.clone()), Arc::new(Offline)).unwrap();
        complete(&mut controller, "slash");

        let index = controller
            .result()
            .iter()
            .position(|m| m.destination_url == "http://slashdot.org/")
            .unwrap();
        assert!(controller.delete_match(index));
        assert!(!urls(&controller).contains(&"http://slashdot.org/".to_string()));
        assert_eq!(db.count().unwrap(), 0);

        let search = controller
            .result()
            .iter()
            .position(|m| m.provider == ProviderKind::Search)
            .unwrap();
        assert!(!controller.delete_match(search));
    }

    #[test]
    fn test_stop_discards_pending_work() {
        let db = store(&[("http://slashdot.org/", 50, 10)]);
        let mut controller =
            CompletionController::new(&settings(), Some(db), Arc::new(Offline)).unwrap();
        let input = controller.make_input("slash", "", false, false);
        assert!(!controller.start(input, false));

        controller.stop(false);
        assert!(controller.done());
        let before = controller.result().clone();

        let mut calls = 0;
        let mut listener = |_: &CompletionResult, _: bool, _: bool| calls += 1;
        controller.process_replies(Duration::from_millis(200), &mut listener);
        assert_eq!(calls, 0);
        assert_eq!(controller.result(), &before);
    }
}
