//! Bookmark titles and full-text history.
//!
//! Bookmark titles are matched right away. Page titles and text of recent
//! history are searched on the history lane. More rows are kept than the
//! popup shows; the surplus is suppressed so the controller can offer a
//! "see N more" shortcut instead.

use crate::completion::classify::{classify_location, classify_match_spans, format_url};
use crate::completion::dispatch::ReplySink;
use crate::completion::item::{CompletionItem, CompletionType, Style};
use crate::completion::provider::{
    AutocompleteProvider, HistoryContentsInfo, ProviderKind, ProviderReply, RequestTokens,
};
use crate::config;
use crate::history::backend::now;
use crate::history::{BookmarkStore, FullTextOptions, FullTextRow, HistoryBackend};
use crate::settings::Settings;
use crate::url_bar::fixup;
use crate::url_bar::{AutocompleteInput, InputType};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ContentsRow {
    url: String,
    title: String,
    title_match: bool,
    starred: bool,
}

/// Per-query counters, one per relevance bucket, so rows in the same
/// bucket keep their order
#[derive(Debug, Default)]
struct BucketCounters {
    starred_title: i32,
    starred_body: i32,
    title: i32,
    body: i32,
}

impl BucketCounters {
    fn score(&mut self, query_like: bool, row: &ContentsRow) -> i32 {
        let (base, counter) = match (row.starred, row.title_match) {
            (true, true) => (if query_like { 1200 } else { 1000 }, &mut self.starred_title),
            (true, false) => (if query_like { 750 } else { 550 }, &mut self.starred_body),
            (false, true) => (if query_like { 900 } else { 700 }, &mut self.title),
            (false, false) => (if query_like { 700 } else { 500 }, &mut self.body),
        };
        let score = base + *counter;
        *counter += 1;
        score
    }
}

/// Scores for `rows`, which are best first. Scored from the back so the
/// increments favour earlier rows.
fn score_rows(query_like: bool, rows: &[ContentsRow]) -> Vec<i32> {
    let mut counters = BucketCounters::default();
    let mut scores = vec![0; rows.len()];
    for i in (0..rows.len()).rev() {
        scores[i] = counters.score(query_like, &rows[i]);
    }
    scores
}

pub struct HistoryContentsProvider {
    history: Option<Arc<dyn HistoryBackend>>,
    bookmarks: Option<Arc<dyn BookmarkStore>>,
    popup_cap: usize,
    visible_max: usize,
    days: i64,

    input: Option<AutocompleteInput>,
    results: Vec<ContentsRow>,
    have_results: bool,
    hit_limit: bool,
    matches: Vec<CompletionItem>,

    tokens: RequestTokens,
    pending: Option<u64>,
}

impl HistoryContentsProvider {
    pub fn new(
        settings: &Settings,
        history: Option<Arc<dyn HistoryBackend>>,
        bookmarks: Option<Arc<dyn BookmarkStore>>,
    ) -> Self {
        Self {
            history,
            bookmarks,
            popup_cap: settings.max_matches + 1,
            visible_max: settings.history_contents_max_matches,
            days: settings.history_contents_days,
            input: None,
            results: Vec::new(),
            have_results: false,
            hit_limit: false,
            matches: Vec::new(),
            tokens: RequestTokens::default(),
            pending: None,
        }
    }

    fn reset(&mut self) {
        self.results.clear();
        self.have_results = false;
        self.hit_limit = false;
        self.matches.clear();
    }

    fn query_bookmarks(&mut self, text: &str) {
        let Some(bookmarks) = &self.bookmarks else {
            return;
        };
        match bookmarks.titles_matching(text, self.popup_cap) {
            Ok(found) => self.results.extend(found.into_iter().map(|b| ContentsRow {
                url: b.url,
                title: b.title,
                title_match: true,
                starred: true,
            })),
            Err(e) => log::warn!("Bookmark title lookup failed: {}", e),
        }
    }

    fn add_history_rows(&mut self, rows: Vec<FullTextRow>) {
        self.hit_limit = rows.len() >= config::HISTORY_CONTENTS_QUERY_LIMIT;
        for found in rows {
            let starred = self
                .bookmarks
                .as_ref()
                .is_some_and(|b| b.is_bookmarked(&found.row.url).unwrap_or(false));
            let row = ContentsRow {
                url: found.row.url,
                title: found.row.title,
                title_match: found.title_match,
                starred,
            };
            match self.results.iter_mut().find(|r| r.url == row.url) {
                Some(existing) => *existing = row,
                None => self.results.push(row),
            }
        }
    }

    fn convert_results(&mut self) {
        self.matches.clear();
        let Some(input) = &self.input else {
            return;
        };

        let query_like = matches!(input.input_type(), InputType::Query | InputType::ForcedQuery);
        let scores = score_rows(query_like, &self.results);
        let mut order: Vec<usize> = (0..self.results.len()).collect();
        order.sort_by(|a, b| scores[*b].cmp(&scores[*a]));

        let trim_http = !fixup::has_http_scheme(input.text());
        self.matches = order
            .into_iter()
            .take(self.popup_cap)
            .enumerate()
            .map(|(i, r)| {
                let mut item = row_to_match(input, &self.results[r], scores[r], trim_http);
                item.suppressed = i >= self.visible_max;
                item
            })
            .collect();
    }
}

fn row_to_match(
    input: &AutocompleteInput,
    row: &ContentsRow,
    relevance: i32,
    trim_http: bool,
) -> CompletionItem {
    let completion_type = if row.title_match {
        CompletionType::HistoryTitle
    } else {
        CompletionType::HistoryBody
    };
    let mut item = CompletionItem::new(ProviderKind::HistoryContents, relevance, false, completion_type);
    item.destination_url = row.url.clone();
    item.contents = format_url(&row.url, trim_http, &mut None);
    item.contents_class = classify_location(None, 0, item.contents.len(), Style::URL);
    item.fill_into_edit = item.contents.clone();
    item.description = row.title.clone();
    item.description_class = classify_match_spans(input.text(), &row.title, Style::NONE);
    item.starred = row.starred;
    item
}

impl AutocompleteProvider for HistoryContentsProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::HistoryContents
    }

    fn start(&mut self, input: &AutocompleteInput, minimal_changes: bool, sink: &ReplySink) {
        let looks_like_url = match input.input_type() {
            InputType::Invalid | InputType::Url => true,
            InputType::Unknown | InputType::RequestedUrl => input.text().contains('.'),
            InputType::Query | InputType::ForcedQuery => false,
        };
        if input.text().is_empty() || looks_like_url {
            self.stop();
            self.reset();
            self.input = None;
            return;
        }

        self.input = Some(input.clone());
        if minimal_changes && (self.have_results || self.pending.is_some()) {
            self.convert_results();
            return;
        }

        self.stop();
        self.reset();
        self.query_bookmarks(input.text());

        if !input.synchronous_only() {
            if let Some(history) = self.history.clone() {
                let token = self.tokens.next();
                let text = input.text().to_string();
                let options = FullTextOptions {
                    begin_time: now() - self.days * 24 * 60 * 60,
                    max_count: config::HISTORY_CONTENTS_QUERY_LIMIT,
                };
                let queued = sink.on_history_lane(self.kind(), token, move || {
                    let rows = history.query_full_text(&text, &options).unwrap_or_else(|e| {
                        log::warn!("Full-text history query failed: {}", e);
                        Vec::new()
                    });
                    ProviderReply::FullText(rows)
                });
                if queued {
                    self.pending = Some(token);
                }
            }
        }

        self.convert_results();
    }

    fn stop(&mut self) {
        self.pending = None;
    }

    fn done(&self) -> bool {
        self.pending.is_none()
    }

    fn matches(&self) -> &[CompletionItem] {
        &self.matches
    }

    fn on_reply(&mut self, token: u64, reply: ProviderReply, _sink: &ReplySink) -> bool {
        let ProviderReply::FullText(rows) = reply else {
            return false;
        };
        if self.pending != Some(token) {
            return false;
        }

        self.pending = None;
        self.add_history_rows(rows);
        self.have_results = true;
        self.convert_results();
        true
    }

    fn delete_match(&mut self, item: &CompletionItem) {
        let url = item.destination_url.as_str();
        self.results.retain(|r| r.url != url);
        self.matches.retain(|m| m.destination_url != url);
    }

    fn history_contents_info(&self) -> Option<HistoryContentsInfo> {
        self.input.as_ref()?;
        Some(HistoryContentsInfo {
            db_match_count: self.results.len(),
            hit_limit: self.hit_limit,
        })
    }
}
